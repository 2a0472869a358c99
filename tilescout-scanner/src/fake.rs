//! Deterministic in-memory browser used by tests.
//!
//! Every URL maps to a [`FakePage`]. Each session gets its own copy of the
//! page on navigation, so "load more" progress never leaks between visits.

use crate::driver::{BoundingBox, BrowserDriver, PageSession};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Open,
    Navigate(String),
    Evaluate(String),
    Query(String),
    QueryAll(String),
    Click,
    ClickAt(f64, f64),
    ScrollIntoView,
    Scroll,
    AtBottom,
    Content,
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    body: String,
    batches: VecDeque<String>,
    trigger: String,
    scrolls_to_bottom: usize,
    reject_direct_click: bool,
    reject_all_clicks: bool,
    fail_navigation: bool,
    fail_scroll: bool,
}

impl FakePage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// A page whose navigation always fails.
    pub fn unreachable() -> Self {
        Self {
            fail_navigation: true,
            ..Default::default()
        }
    }

    /// Markup appended one batch per successful trigger click. `trigger` is
    /// rendered after the body while batches remain.
    pub fn with_batches(mut self, trigger: impl Into<String>, batches: Vec<String>) -> Self {
        self.trigger = trigger.into();
        self.batches = batches.into();
        self
    }

    /// Number of scroll increments before the viewport reaches the bottom.
    pub fn with_scroll_height(mut self, scrolls: usize) -> Self {
        self.scrolls_to_bottom = scrolls;
        self
    }

    pub fn rejecting_direct_clicks(mut self) -> Self {
        self.reject_direct_click = true;
        self
    }

    pub fn rejecting_all_clicks(mut self) -> Self {
        self.reject_direct_click = true;
        self.reject_all_clicks = true;
        self
    }

    /// Every incremental scroll fails, as a crashed script context would.
    pub fn failing_scrolls(mut self) -> Self {
        self.fail_scroll = true;
        self
    }

    fn render(&self) -> String {
        let trigger = if self.batches.is_empty() {
            ""
        } else {
            self.trigger.as_str()
        };
        format!("<html><body>{}{}</body></html>", self.body, trigger)
    }

    fn load_next_batch(&mut self) {
        if let Some(batch) = self.batches.pop_front() {
            self.body.push_str(&batch);
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    pages: Arc<Mutex<HashMap<String, FakePage>>>,
    calls: Arc<Mutex<Vec<DriverCall>>>,
    sessions: Arc<AtomicUsize>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, page: FakePage) -> Self {
        self.pages
            .lock()
            .expect("fake page table poisoned")
            .insert(url.to_string(), page);
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().expect("fake call log poisoned").clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().expect("fake call log poisoned").push(call);
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession> {
        self.record(DriverCall::Open);
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            driver: self.clone(),
            page: None,
            scrolled: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    pub selector: String,
}

pub struct FakeSession {
    driver: FakeDriver,
    page: Option<FakePage>,
    scrolled: usize,
}

impl FakeSession {
    fn current(&mut self) -> Result<&mut FakePage> {
        self.page
            .as_mut()
            .ok_or_else(|| ScanError::Driver("no document loaded".to_string()))
    }

    fn count_matches(&mut self, selector: &str) -> Result<usize> {
        let html = self.current()?.render();
        let selector =
            Selector::parse(selector).map_err(|_| ScanError::Selector(selector.to_string()))?;
        Ok(Html::parse_document(&html).select(&selector).count())
    }
}

#[async_trait]
impl PageSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.driver.record(DriverCall::Navigate(url.to_string()));
        let page = self
            .driver
            .pages
            .lock()
            .expect("fake page table poisoned")
            .get(url)
            .cloned();

        match page {
            Some(page) if !page.fail_navigation => {
                self.page = Some(page);
                self.scrolled = 0;
                Ok(())
            }
            Some(_) => Err(ScanError::navigation(url, "net::ERR_TIMED_OUT")),
            None => Err(ScanError::navigation(url, "net::ERR_NAME_NOT_RESOLVED")),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        self.driver.record(DriverCall::Evaluate(script.to_string()));
        Ok(serde_json::Value::Null)
    }

    async fn query(&mut self, selector: &str) -> Result<Option<FakeElement>> {
        self.driver.record(DriverCall::Query(selector.to_string()));
        let found = self.count_matches(selector)? > 0;
        Ok(found.then(|| FakeElement {
            selector: selector.to_string(),
        }))
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<FakeElement>> {
        self.driver.record(DriverCall::QueryAll(selector.to_string()));
        let count = self.count_matches(selector)?;
        Ok((0..count)
            .map(|_| FakeElement {
                selector: selector.to_string(),
            })
            .collect())
    }

    async fn click(&mut self, _element: &FakeElement) -> Result<()> {
        self.driver.record(DriverCall::Click);
        let page = self.current()?;
        if page.reject_direct_click {
            return Err(ScanError::Driver("element is not clickable".to_string()));
        }
        page.load_next_batch();
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<()> {
        self.driver.record(DriverCall::ClickAt(x, y));
        let page = self.current()?;
        if page.reject_all_clicks {
            return Err(ScanError::Driver("click intercepted".to_string()));
        }
        page.load_next_batch();
        Ok(())
    }

    async fn bounding_box(&mut self, _element: &FakeElement) -> Result<Option<BoundingBox>> {
        Ok(Some(BoundingBox {
            x: 100.0,
            y: 600.0,
            width: 200.0,
            height: 40.0,
        }))
    }

    async fn scroll_into_view(&mut self, _element: &FakeElement) -> Result<()> {
        self.driver.record(DriverCall::ScrollIntoView);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.driver.record(DriverCall::Content);
        Ok(self.current()?.render())
    }

    async fn close(&mut self) -> Result<()> {
        self.driver.record(DriverCall::Close);
        self.page = None;
        Ok(())
    }

    async fn scroll(&mut self, _delta: f64) -> Result<()> {
        self.driver.record(DriverCall::Scroll);
        if self.current()?.fail_scroll {
            return Err(ScanError::Script("Execution context was destroyed".to_string()));
        }
        self.scrolled += 1;
        Ok(())
    }

    async fn at_bottom(&mut self) -> Result<bool> {
        self.driver.record(DriverCall::AtBottom);
        let limit = self.current()?.scrolls_to_bottom;
        Ok(self.scrolled >= limit)
    }
}
