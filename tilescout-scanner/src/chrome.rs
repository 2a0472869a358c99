//! Chrome DevTools implementation of the driver traits.

use crate::driver::{BoundingBox, BrowserDriver, PageSession};
use crate::error::{Result, ScanError};
use crate::profile::{Identity, SiteProfile};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::layout::Point;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--disable-gpu",
];

#[derive(Debug, Clone)]
pub struct ChromeConfig {
    pub headless: bool,
    /// DevTools endpoint of an already running Chrome, e.g. `http://localhost:9222`.
    pub remote_url: Option<String>,
    pub timeout: Duration,
    pub identity: Identity,
    pub consent_selector: Option<String>,
}

impl ChromeConfig {
    pub fn from_profile(profile: &SiteProfile) -> Self {
        Self {
            headless: true,
            remote_url: None,
            timeout: Duration::from_secs(60),
            identity: profile.identity.clone(),
            consent_selector: profile.consent_selector.clone(),
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_remote_url(mut self, remote_url: Option<String>) -> Self {
        self.remote_url = remote_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct ChromeDriver {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    config: ChromeConfig,
}

impl ChromeDriver {
    /// Launch a local Chrome, or attach to `remote_url` when one is configured.
    pub async fn start(config: ChromeConfig) -> Result<Self> {
        match config.remote_url.clone() {
            Some(remote) => Self::connect(config, &remote).await,
            None => Self::launch(config).await,
        }
    }

    pub async fn launch(config: ChromeConfig) -> Result<Self> {
        info!("Launching Chrome (headless={})", config.headless);

        let mut builder = BrowserConfig::builder().request_timeout(config.timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        let browser_config = builder.build().map_err(ScanError::Driver)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScanError::Driver(format!("failed to launch Chrome: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            config,
        })
    }

    pub async fn connect(config: ChromeConfig, remote: &str) -> Result<Self> {
        info!("Connecting to remote Chrome at {}", remote);

        let ws_url = resolve_debugger_url(remote).await?;
        debug!("Using DevTools socket {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: config.timeout,
            ..Default::default()
        };
        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| ScanError::Driver(format!("failed to connect to Chrome: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            config,
        })
    }

    /// Close the browser and stop the event loop.
    pub async fn shutdown(self) {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            debug!("Closing Chrome failed: {}", e);
        }
        self.handler.abort();
    }

    async fn prepare(&self, page: &Page) -> Result<()> {
        let identity = &self.config.identity;
        let mut params = SetUserAgentOverrideParams::new(identity.user_agent.clone());
        params.accept_language = Some(identity.accept_language.clone());
        page.execute(params).await.map_err(driver_error)?;

        page.evaluate_on_new_document(HIDE_WEBDRIVER_SCRIPT)
            .await
            .map_err(driver_error)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    type Session = ChromePage;

    async fn open(&self) -> Result<ChromePage> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(driver_error)?;

        self.prepare(&page).await?;

        Ok(ChromePage {
            page: Some(page),
            timeout: self.config.timeout,
            consent_selector: self.config.consent_selector.clone(),
        })
    }
}

/// Ask a DevTools HTTP endpoint for its browser websocket URL.
pub async fn resolve_debugger_url(remote: &str) -> Result<String> {
    let http_url = remote
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let version: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await
        .map_err(|e| ScanError::Driver(format!("remote Chrome unreachable: {}", e)))?
        .json()
        .await
        .map_err(|e| ScanError::Driver(format!("bad version info from {}: {}", version_url, e)))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ScanError::Driver("no webSocketDebuggerUrl in version info".to_string()))
}

pub struct ChromePage {
    page: Option<Page>,
    timeout: Duration,
    consent_selector: Option<String>,
}

impl ChromePage {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScanError::Driver("page already closed".to_string()))
    }

    async fn accept_consent(&mut self) {
        let Some(selector) = self.consent_selector.take() else {
            return;
        };
        let Ok(page) = self.page() else {
            return;
        };
        match page.find_elements(selector.as_str()).await {
            Ok(buttons) => {
                if let Some(button) = buttons.first() {
                    match button.click().await {
                        Ok(_) => debug!("Accepted cookie consent"),
                        Err(e) => debug!("Consent click failed: {}", e),
                    }
                }
            }
            Err(e) => debug!("Consent lookup failed: {}", e),
        }
    }
}

#[async_trait]
impl PageSession for ChromePage {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        let page = self.page()?;
        tokio::time::timeout(self.timeout, page.goto(url))
            .await
            .map_err(|_| ScanError::navigation(url, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| ScanError::navigation(url, e))?;

        self.accept_consent().await;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| ScanError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn query(&mut self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>> {
        self.page()?
            .find_elements(selector)
            .await
            .map_err(driver_error)
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        element.click().await.map_err(driver_error)?;
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<()> {
        self.page()?
            .click(Point::new(x, y))
            .await
            .map_err(driver_error)?;
        Ok(())
    }

    async fn bounding_box(&mut self, element: &Element) -> Result<Option<BoundingBox>> {
        match element.bounding_box().await {
            Ok(bbox) => Ok(Some(BoundingBox {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
            })),
            Err(e) => {
                debug!("No bounding box: {}", e);
                Ok(None)
            }
        }
    }

    async fn scroll_into_view(&mut self, element: &Element) -> Result<()> {
        element.scroll_into_view().await.map_err(driver_error)?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?.content().await.map_err(driver_error)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            warn!("Closing page failed: {}", e);
        }
        Ok(())
    }
}

fn driver_error(e: impl std::fmt::Display) -> ScanError {
    ScanError::Driver(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_resolve_debugger_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "Chrome/120.0.0.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
            })))
            .mount(&server)
            .await;

        let ws = resolve_debugger_url(&format!("{}/", server.uri()))
            .await
            .unwrap();

        assert_eq!(ws, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn test_resolve_debugger_url_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "Chrome/120.0.0.0"
            })))
            .mount(&server)
            .await;

        let result = resolve_debugger_url(&server.uri()).await;

        assert!(matches!(result, Err(ScanError::Driver(_))));
    }

    #[test]
    fn test_config_from_profile() {
        let config = ChromeConfig::from_profile(&SiteProfile::default())
            .with_headless(false)
            .with_timeout(Duration::from_secs(5));

        assert!(!config.headless);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.consent_selector.as_deref(),
            Some("#onetrust-accept-btn-handler")
        );
    }
}
