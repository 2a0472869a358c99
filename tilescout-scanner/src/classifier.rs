//! Listing-page detection over a settled DOM snapshot.

use crate::driver::PageSession;
use crate::error::{Result, ScanError};
use crate::profile::SiteProfile;
use scraper::{Html, Selector};

/// The serialized DOM of a loaded page, taken after it settled.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub async fn capture<S: PageSession>(session: &mut S, url: &str) -> Result<Self> {
        let html = session.content().await?;
        Ok(Self::new(url, html))
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Decides whether a page hosts a product listing.
pub trait PageClassifier: Send + Sync {
    fn is_listing(&self, page: &PageSnapshot) -> bool;
}

impl<F> PageClassifier for F
where
    F: Fn(&PageSnapshot) -> bool + Send + Sync,
{
    fn is_listing(&self, page: &PageSnapshot) -> bool {
        self(page)
    }
}

/// A page is a listing when it shows at least one product tile or a
/// "load more" control. Either signal alone is enough.
pub struct TileSignalClassifier {
    tile: Selector,
    trigger: Selector,
}

impl TileSignalClassifier {
    pub fn new(tile_selector: &str, trigger_selector: &str) -> Result<Self> {
        Ok(Self {
            tile: parse_selector(tile_selector)?,
            trigger: parse_selector(trigger_selector)?,
        })
    }

    pub fn from_profile(profile: &SiteProfile) -> Result<Self> {
        Self::new(&profile.tile_selector, &profile.trigger_selector)
    }
}

impl PageClassifier for TileSignalClassifier {
    fn is_listing(&self, page: &PageSnapshot) -> bool {
        let document = page.document();
        let has_tiles = document.select(&self.tile).next().is_some();
        let has_trigger = document.select(&self.trigger).next().is_some();
        has_tiles || has_trigger
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| ScanError::Selector(selector.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TileSignalClassifier {
        TileSignalClassifier::from_profile(&SiteProfile::default()).unwrap()
    }

    fn page(body: &str) -> PageSnapshot {
        PageSnapshot::new(
            "https://www.public.gr/cat/laptops",
            format!("<html><body>{}</body></html>", body),
        )
    }

    #[test]
    fn test_single_tile_without_trigger_is_listing() {
        let snapshot = page(r#"<div class="product-tile-container">Laptop</div>"#);
        assert!(classifier().is_listing(&snapshot));
    }

    #[test]
    fn test_trigger_without_tiles_is_listing() {
        let snapshot = page(r#"<button aria-label="Δες περισσότερα">Δες περισσότερα</button>"#);
        assert!(classifier().is_listing(&snapshot));
    }

    #[test]
    fn test_label_attribute_trigger_is_listing() {
        let snapshot = page(r#"<app-button label="Δες περισσότερα"></app-button>"#);
        assert!(classifier().is_listing(&snapshot));
    }

    #[test]
    fn test_category_hub_is_not_listing() {
        let snapshot = page(
            r#"<nav><a href="/cat/laptops">Laptops</a><a href="/cat/tablets">Tablets</a></nav>"#,
        );
        assert!(!classifier().is_listing(&snapshot));
    }

    #[test]
    fn test_closure_classifier() {
        let by_url = |page: &PageSnapshot| page.url.ends_with("/laptops");
        assert!(by_url.is_listing(&page("")));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        assert!(matches!(
            TileSignalClassifier::new("div[", ".more"),
            Err(ScanError::Selector(_))
        ));
    }
}
