use serde::{Deserialize, Serialize};
use url::Url;

/// One product card read from a listing page.
///
/// Field order is the export order: `code, title, price, availability,
/// specs, image, link`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub code: String,
    pub title: String,
    pub price: String,
    pub availability: String,
    pub specs: String,
    pub image: String,
    pub link: String,
}

impl ProductRecord {
    pub const FIELDS: [&'static str; 7] = [
        "code",
        "title",
        "price",
        "availability",
        "specs",
        "image",
        "link",
    ];

    pub fn new(title: String, link: String) -> Self {
        Self {
            code: code_from_link(&link),
            title,
            link,
            ..Default::default()
        }
    }

    /// True when a detail-page visit could still fill something in.
    pub fn missing_details(&self) -> bool {
        self.availability.is_empty() || self.specs.is_empty()
    }
}

/// Final path segment of a product link, empty for an empty link.
pub fn code_from_link(link: &str) -> String {
    if link.is_empty() {
        return String::new();
    }

    match Url::parse(link) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => {
            let path = link.split(['?', '#']).next().unwrap_or(link);
            path.rsplit('/').next().unwrap_or_default().to_string()
        }
    }
}
