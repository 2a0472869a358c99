//! Product card extraction.
//!
//! Every record field is resolved through a [`FallbackChain`]: an ordered list
//! of (locator, extractor) candidates evaluated by one generic resolver. The
//! first candidate that yields non-blank text wins; an exhausted chain leaves
//! the field empty.

use crate::classifier::parse_selector;
use crate::driver::PageSession;
use crate::error::{Result, ScanError};
use crate::profile::SiteProfile;
use crate::result::{ProductRecord, code_from_link};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub type ExtractFn = Arc<dyn Fn(ElementRef<'_>) -> Option<String> + Send + Sync>;

/// Where a candidate looks inside a card.
pub enum Locator {
    /// First descendant matching the selector.
    First(Selector),
    /// The card element itself.
    Card,
}

pub struct Candidate {
    label: String,
    locator: Locator,
    extract: ExtractFn,
}

#[derive(Default)]
pub struct FallbackChain {
    candidates: Vec<Candidate>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selector: &str, extract: ExtractFn) -> Result<Self> {
        self.candidates.push(Candidate {
            label: selector.to_string(),
            locator: Locator::First(parse_selector(selector)?),
            extract,
        });
        Ok(self)
    }

    pub fn card(mut self, label: &str, extract: ExtractFn) -> Self {
        self.candidates.push(Candidate {
            label: label.to_string(),
            locator: Locator::Card,
            extract,
        });
        self
    }

    /// One candidate per selector, all sharing the same extractor.
    pub fn from_selectors(selectors: &[String], extract: ExtractFn) -> Result<Self> {
        selectors
            .iter()
            .try_fold(Self::new(), |chain, sel| chain.select(sel, extract.clone()))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Winning element and its whitespace-normalized value.
    pub fn locate<'a>(&self, card: ElementRef<'a>) -> Option<(ElementRef<'a>, String)> {
        for candidate in &self.candidates {
            let element = match &candidate.locator {
                Locator::First(selector) => card.select(selector).next(),
                Locator::Card => Some(card),
            };
            let Some(element) = element else {
                continue;
            };

            if let Some(value) = (candidate.extract)(element) {
                let value = normalize_whitespace(&value);
                if !value.is_empty() {
                    debug!("Resolved by '{}'", candidate.label);
                    return Some((element, value));
                }
            }
        }
        None
    }

    pub fn resolve(&self, card: ElementRef<'_>) -> String {
        self.locate(card).map(|(_, value)| value).unwrap_or_default()
    }
}

/// Collapse whitespace runs to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Elements whose boundaries read as a line break in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "section", "table", "td", "th", "tr", "ul",
];

pub fn text() -> ExtractFn {
    Arc::new(|el: ElementRef<'_>| Some(el.text().collect::<String>()))
}

/// Text with a break at every block boundary, so `<li>a</li><li>b</li>`
/// reads as two words even in minified markup.
pub fn block_text() -> ExtractFn {
    Arc::new(|el: ElementRef<'_>| Some(rendered_text(el)))
}

/// Whitespace-normalized text of `el`, separating block-level children.
pub fn rendered_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_rendered(el, &mut out);
    normalize_whitespace(&out)
}

fn push_rendered(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let block = BLOCK_TAGS.contains(&child.value().name());
            if block {
                out.push(' ');
            }
            push_rendered(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}

pub fn attr(name: &'static str) -> ExtractFn {
    Arc::new(move |el: ElementRef<'_>| el.value().attr(name).map(str::to_string))
}

/// URL of the last (largest) candidate of a `srcset` list.
pub fn last_srcset_candidate() -> ExtractFn {
    Arc::new(|el: ElementRef<'_>| {
        let srcset = el.value().attr("srcset")?;
        srcset
            .split(',')
            .next_back()
            .and_then(|entry| entry.split_whitespace().next())
            .map(str::to_string)
    })
}

/// First `img`/`source` whose src, data-src or srcset looks like an image file.
pub fn any_image(pattern: Regex) -> Result<ExtractFn> {
    let sources = parse_selector("img, source")?;
    Ok(Arc::new(move |card: ElementRef<'_>| {
        card.select(&sources)
            .filter_map(|node| {
                let value = node.value();
                ["src", "data-src", "srcset"]
                    .iter()
                    .filter_map(|name| value.attr(name))
                    .find(|v| !v.is_empty())
            })
            .find(|candidate| pattern.is_match(candidate))
            .map(str::to_string)
    }))
}

/// Earliest occurrence of any known status phrase in the card's text.
pub fn status_phrase(phrases: Vec<String>) -> ExtractFn {
    Arc::new(move |card: ElementRef<'_>| {
        let text = rendered_text(card);
        phrases
            .iter()
            .filter_map(|phrase| text.find(phrase.as_str()).map(|pos| (pos, phrase)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, phrase)| phrase.clone())
    })
}

pub struct RecordExtractor {
    tile: Selector,
    title_link: FallbackChain,
    price: FallbackChain,
    availability: FallbackChain,
    specs: FallbackChain,
    image: FallbackChain,
}

impl RecordExtractor {
    pub fn from_profile(profile: &SiteProfile) -> Result<Self> {
        let fields = &profile.fields;

        let image_pattern = RegexBuilder::new(&fields.image_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ScanError::Other(format!("Invalid image pattern: {}", e)))?;

        let availability = FallbackChain::from_selectors(&fields.availability, text())?
            .card("status phrase", status_phrase(fields.availability_phrases.clone()));

        let image = FallbackChain::new()
            .select("img", attr("src"))?
            .select("img", attr("data-src"))?
            .select("img", attr("data-lazy"))?
            .select("picture source[srcset]", last_srcset_candidate())?
            .card("image-like attribute", any_image(image_pattern)?);

        Ok(Self {
            tile: parse_selector(&profile.tile_selector)?,
            title_link: FallbackChain::from_selectors(&fields.title_link, attr("href"))?,
            price: FallbackChain::from_selectors(&fields.price, text())?,
            availability,
            specs: FallbackChain::from_selectors(&fields.specs, block_text())?,
            image,
        })
    }

    /// Read the session's current document. Call after pagination finished.
    pub async fn extract<S: PageSession>(
        &self,
        page: &mut S,
        page_url: &str,
    ) -> Result<Vec<ProductRecord>> {
        let html = page.content().await?;
        Ok(self.extract_html(&html, page_url))
    }

    /// One record per card, in document order.
    pub fn extract_html(&self, html: &str, page_url: &str) -> Vec<ProductRecord> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        document
            .select(&self.tile)
            .map(|card| self.extract_card(card, base.as_ref()))
            .collect()
    }

    pub fn extract_card(&self, card: ElementRef<'_>, base: Option<&Url>) -> ProductRecord {
        let (title, link) = match self.title_link.locate(card) {
            Some((anchor, href)) => (
                normalize_whitespace(&anchor.text().collect::<String>()),
                absolutize(base, &href),
            ),
            None => (String::new(), String::new()),
        };

        ProductRecord {
            code: code_from_link(&link),
            title,
            price: self.price.resolve(card),
            availability: self.availability.resolve(card),
            specs: self.specs.resolve(card),
            image: self.image.resolve(card),
            link,
        }
    }
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.public.gr/cat/computers/laptops";

    fn extractor() -> RecordExtractor {
        RecordExtractor::from_profile(&SiteProfile::default()).unwrap()
    }

    fn cards(cards: &[&str]) -> String {
        let mut html = String::from("<html><body><div class=\"grid\">");
        for card in cards {
            html.push_str(&format!(r#"<div class="product-tile-container">{}</div>"#, card));
        }
        html.push_str("</div></body></html>");
        html
    }

    const FULL_CARD: &str = r#"
        <h3 class="product__title"><a href="/p/lenovo-ideapad-5/1829374">  Lenovo
            IdeaPad 5 </a></h3>
        <app-product-price><span class="product__price">899,00 €</span></app-product-price>
        <div class="availability-container"><strong>Άμεσα Διαθέσιμο</strong></div>
        <ul class="product-specs"><li>16GB RAM</li>
            <li>512GB SSD</li></ul>
        <img src="https://cdn.public.gr/lenovo.webp">
    "#;

    #[test]
    fn test_full_card() {
        let records = extractor().extract_html(&cards(&[FULL_CARD]), PAGE);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Lenovo IdeaPad 5");
        assert_eq!(record.link, "https://www.public.gr/p/lenovo-ideapad-5/1829374");
        assert_eq!(record.code, "1829374");
        assert_eq!(record.price, "899,00 €");
        assert_eq!(record.availability, "Άμεσα Διαθέσιμο");
        assert_eq!(record.specs, "16GB RAM 512GB SSD");
        assert_eq!(record.image, "https://cdn.public.gr/lenovo.webp");
    }

    #[test]
    fn test_missing_price_leaves_field_empty() {
        let card = r#"
            <a class="product__title" href="/p/hp-15/555">HP 15</a>
            <div class="availability-container"><strong>Μη διαθέσιμο</strong></div>
            <div class="specs">8GB RAM</div>
            <img data-src="https://cdn.public.gr/hp.jpg">
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.price, "");
        assert_eq!(record.title, "HP 15");
        assert_eq!(record.code, "555");
        assert_eq!(record.availability, "Μη διαθέσιμο");
        assert_eq!(record.specs, "8GB RAM");
        assert_eq!(record.image, "https://cdn.public.gr/hp.jpg");
    }

    #[test]
    fn test_picture_srcset_uses_last_candidate() {
        let card = r#"
            <a title="Asus" href="/p/asus/77">Asus Vivobook</a>
            <picture>
                <source srcset="https://cdn.public.gr/asus-320.avif 320w, https://cdn.public.gr/asus-640.avif 640w, https://cdn.public.gr/asus-1280.avif 1280w">
                <img alt="Asus">
            </picture>
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.image, "https://cdn.public.gr/asus-1280.avif");
    }

    #[test]
    fn test_image_pattern_fallback() {
        let card = r#"
            <a href="/p/acer/88">Acer</a>
            <div class="media"><source data-src="https://cdn.public.gr/acer.PNG?v=2"></div>
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.image, "https://cdn.public.gr/acer.PNG?v=2");
    }

    #[test]
    fn test_availability_phrase_scan() {
        let card = r#"
            <a href="/p/dell/99">Dell XPS</a>
            <div class="badge">Σε απόθεμα: Διαθέσιμο με παραγγελία (3-5 ημέρες)</div>
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.availability, "Διαθέσιμο με παραγγελία");
    }

    #[test]
    fn test_earlier_chain_candidate_wins() {
        let card = r#"
            <a href="/p/generic/1">Generic anchor</a>
            <div class="tile-title"><a href="/p/tile-title/2">Tile title anchor</a></div>
            <span class="price__current">10,00 €</span>
            <app-product-price><span class="product__price">9,00 €</span></app-product-price>
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.title, "Tile title anchor");
        assert_eq!(record.code, "2");
        assert_eq!(record.price, "9,00 €");
    }

    #[test]
    fn test_blank_candidate_falls_through() {
        let card = r#"
            <a href="/p/x/3">X</a>
            <div class="availability-container"><strong>   </strong></div>
            <app-product-list-availability><strong>Εξαντλημένο</strong></app-product-list-availability>
        "#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.availability, "Εξαντλημένο");
    }

    #[test]
    fn test_empty_card_is_kept() {
        let records = extractor().extract_html(&cards(&["<span>coming soon</span>"]), PAGE);

        assert_eq!(records, vec![ProductRecord::default()]);
    }

    #[test]
    fn test_dom_order_and_determinism() {
        let html = cards(&[
            r#"<a href="/p/first/1">First</a>"#,
            r#"<a href="/p/second/2">Second</a>"#,
            r#"<a href="/p/third/3">Third</a>"#,
        ]);
        let extractor = extractor();

        let first = extractor.extract_html(&html, PAGE);
        let second = extractor.extract_html(&html, PAGE);

        assert_eq!(first, second);
        let codes: Vec<_> = first.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_minified_spec_list_keeps_items_apart() {
        let card = r#"<a href="/p/msi/4">MSI</a><ul class="product-specs"><li>16GB RAM</li><li>512GB SSD</li></ul>"#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.specs, "16GB RAM 512GB SSD");
    }

    #[test]
    fn test_rendered_text_joins_inline_runs() {
        let html = Html::parse_fragment(
            r#"<div id="x"><span>8</span><b>GB</b><p>DDR5</p>tail<br>end</div>"#,
        );
        let selector = Selector::parse("#x").unwrap();
        let element = html.select(&selector).next().unwrap();

        assert_eq!(rendered_text(element), "8GB DDR5 tail end");
    }

    #[test]
    fn test_status_phrase_across_minified_blocks() {
        let card = r#"<a href="/p/lg/5">LG</a><div class="badge"><div>Άμεσα</div><div>Διαθέσιμο</div></div>"#;
        let record = &extractor().extract_html(&cards(&[card]), PAGE)[0];

        assert_eq!(record.availability, "Άμεσα Διαθέσιμο");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace("\n \t"), "");
    }
}
