//! URL canonicalization used as the dedup key everywhere.

use url::Url;

#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    scheme: String,
    host: String,
    category_root: String,
}

impl UrlNormalizer {
    pub fn new(scheme: &str, host: &str, category_root: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            category_root: category_root.to_string(),
        }
    }

    pub fn origin(&self) -> Option<Url> {
        Url::parse(&format!("{}://{}/", self.scheme, self.host)).ok()
    }

    /// Canonical form of `raw`: site scheme and host, original path, no
    /// query, no fragment. Relative input resolves against the site origin.
    /// Returns `None` when `raw` can not be compared with other URLs.
    pub fn try_normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.origin()?.join(raw).ok()?,
            Err(_) => return None,
        };

        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        url.set_scheme(&self.scheme).ok()?;
        url.set_host(Some(&self.host)).ok()?;
        url.set_port(None).ok()?;
        url.set_query(None);
        url.set_fragment(None);

        Some(url.to_string())
    }

    /// Infallible form: input that can not be normalized comes back as is.
    pub fn normalize(&self, raw: &str) -> String {
        self.try_normalize(raw).unwrap_or_else(|| raw.to_string())
    }

    /// True iff `url` is the category tree root, with or without the
    /// trailing separator.
    pub fn is_root_category(&self, url: &str) -> bool {
        let Some(normalized) = self.try_normalize(url) else {
            return false;
        };
        let path = extract_url_path(&normalized);
        path.trim_end_matches('/') == self.category_root.trim_end_matches('/')
    }

    /// True for paths inside the category namespace, excluding the bare root.
    pub fn is_category_path(&self, path: &str) -> bool {
        let root = self.category_root.trim_end_matches('/');
        let namespace = format!("{}/", root);
        path.starts_with(&namespace) && path.trim_end_matches('/') != root
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}
