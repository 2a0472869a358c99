//! The browser capability surface the scanner consumes.
//!
//! Everything the discovery, pagination and extraction code needs from a
//! browser goes through [`PageSession`]. A real Chrome implementation lives in
//! `chrome.rs`; tests use the in-memory driver from `fake.rs`.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const SCROLL_SCRIPT: &str = "window.scrollBy(0, {delta}); true";
const AT_BOTTOM_SCRIPT: &str =
    "(window.innerHeight + window.scrollY) >= document.body.scrollHeight";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One browser tab, owned by exactly one worker at a time.
#[async_trait]
pub trait PageSession: Send {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn query(&mut self, selector: &str) -> Result<Option<Self::Element>>;

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn click(&mut self, element: &Self::Element) -> Result<()>;

    /// Positional click in viewport coordinates.
    async fn click_at(&mut self, x: f64, y: f64) -> Result<()>;

    async fn bounding_box(&mut self, element: &Self::Element) -> Result<Option<BoundingBox>>;

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<()>;

    /// Serialized DOM of the current document.
    async fn content(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;

    async fn scroll(&mut self, delta: f64) -> Result<()> {
        let script = SCROLL_SCRIPT.replace("{delta}", &delta.to_string());
        self.evaluate(&script).await.map(|_| ())
    }

    /// Whether the viewport has reached the end of the scrollable content.
    async fn at_bottom(&mut self) -> Result<bool> {
        let value = self.evaluate(AT_BOTTOM_SCRIPT).await?;
        Ok(value.as_bool().unwrap_or(true))
    }
}

/// Opens fresh page sessions. Identity spoofing happens inside `open`.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Session: PageSession;

    async fn open(&self) -> Result<Self::Session>;
}

/// Open a session, navigate to `url` and wait `settle` for rendering.
///
/// On navigation failure the session is closed before the error is returned.
pub async fn load_page<D: BrowserDriver>(
    driver: &D,
    url: &str,
    settle: Duration,
) -> Result<D::Session> {
    let mut session = driver.open().await?;

    if let Err(e) = session.navigate(url).await {
        if let Err(close_err) = session.close().await {
            debug!("Closing failed session for {}: {}", url, close_err);
        }
        return Err(e);
    }

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    Ok(session)
}

/// Close a session, logging instead of failing.
pub async fn release<S: PageSession>(mut session: S, url: &str) {
    if let Err(e) = session.close().await {
        debug!("Closing session for {} failed: {}", url, e);
    }
}
