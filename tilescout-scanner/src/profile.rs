//! Site profile: everything that is specific to one shop's markup.
//!
//! The defaults describe www.public.gr. Other shops built on the same tile
//! layout can be targeted by loading a JSON profile that overrides any of the
//! fields below.

use crate::error::Result;
use crate::normalize::UrlNormalizer;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Canonical scheme every URL is normalized to.
    pub scheme: String,
    /// Canonical host every URL is normalized to.
    pub host: String,
    /// Path of the category tree root, e.g. `/cat/`.
    pub category_root: String,
    /// Path fragment that marks a product detail page.
    pub product_marker: String,
    /// Container of one product card.
    pub tile_selector: String,
    /// The "load more" control of a listing page.
    pub trigger_selector: String,
    /// Cookie consent button clicked once after navigation, if present.
    pub consent_selector: Option<String>,
    pub fields: FieldLocators,
    pub detail: DetailLocators,
    pub identity: Identity,
}

/// Ordered locator lists, one per record field. Earlier entries win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLocators {
    pub title_link: Vec<String>,
    pub price: Vec<String>,
    pub availability: Vec<String>,
    /// Status phrases searched in the card text when no locator matches.
    pub availability_phrases: Vec<String>,
    pub specs: Vec<String>,
    /// Case-insensitive pattern for attribute values that look like images.
    pub image_pattern: String,
}

/// Locators used by the detail-page enrichment stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailLocators {
    pub availability: String,
    pub spec_items: String,
}

/// Browser identity applied to every session before first navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: "www.public.gr".to_string(),
            category_root: "/cat/".to_string(),
            product_marker: "/p/".to_string(),
            tile_selector: ".product-tile-container".to_string(),
            trigger_selector: r#"[label="Δες περισσότερα"], button[aria-label="Δες περισσότερα"]"#
                .to_string(),
            consent_selector: Some("#onetrust-accept-btn-handler".to_string()),
            fields: FieldLocators::default(),
            detail: DetailLocators::default(),
            identity: Identity::default(),
        }
    }
}

impl Default for FieldLocators {
    fn default() -> Self {
        Self {
            title_link: strings(&[
                "h3.product__title a",
                ".tile-title a[href]",
                "a.product__title",
                "a[title]",
                r#"a[href*="/p/"]"#,
            ]),
            price: strings(&[
                "app-product-price .product__price",
                r#"[class*="product-prices"] .product__price"#,
                ".product__price--large",
                ".product__price--main",
                ".price__current",
                r#"[data-automation-id="productPrice"]"#,
            ]),
            availability: strings(&[
                ".availability-container strong",
                "app-product-list-availability strong",
            ]),
            availability_phrases: strings(&[
                "Άμεσα Διαθέσιμο",
                "Διαθέσιμο με παραγγελία",
                "Μη διαθέσιμο",
                "Εξαντλημένο",
            ]),
            specs: strings(&[
                ".product-specs",
                ".specs",
                ".features",
                ".chips",
                ".attributes",
            ]),
            image_pattern: r"\.(webp|jpg|jpeg|png)(\?|$)".to_string(),
        }
    }
}

impl Default for DetailLocators {
    fn default() -> Self {
        Self {
            availability:
                "app-product-page-availability span.mdc-typography--subtitle2.mdc-typography--bold"
                    .to_string(),
            spec_items: ".product__specifications .specs-table .spec-item".to_string(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "el-GR,el;q=0.9,en;q=0.8".to_string(),
        }
    }
}

impl SiteProfile {
    /// Load a profile from a JSON file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn normalizer(&self) -> UrlNormalizer {
        UrlNormalizer::new(&self.scheme, &self.host, &self.category_root)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
