//! Optional second pass that visits product detail pages to fill in
//! availability and specs the listing card did not show.
//!
//! The pass reads the accumulated records and returns new copies. The input
//! slice is never modified.

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tilescout_scanner::driver::{BrowserDriver, PageSession, load_page, release};
use tilescout_scanner::extract::{normalize_whitespace, rendered_text};
use tilescout_scanner::{ProductRecord, ScanError, SiteProfile};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Values read from one detail page. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub availability: String,
    pub specs: String,
}

pub struct DetailEnricher<D: BrowserDriver> {
    driver: Arc<D>,
    availability: Selector,
    spec_items: Selector,
    settle: Duration,
    workers: usize,
    deadline: Option<Instant>,
}

impl<D: BrowserDriver> DetailEnricher<D> {
    pub fn new(driver: Arc<D>, profile: &SiteProfile) -> Result<Self, ScanError> {
        Ok(Self {
            driver,
            availability: parse(&profile.detail.availability)?,
            spec_items: parse(&profile.detail.spec_items)?,
            settle: Duration::from_millis(1200),
            workers: 1,
            deadline: None,
        })
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Enriched copies of `records`, same length and order.
    pub async fn enrich(&self, records: &[ProductRecord]) -> Vec<ProductRecord> {
        let pending = records.iter().filter(|r| needs_visit(r)).count();
        info!("Enriching {} of {} records from detail pages", pending, records.len());

        stream::iter(records)
            .map(|record| self.enrich_one(record))
            .buffered(self.workers)
            .collect()
            .await
    }

    async fn enrich_one(&self, record: &ProductRecord) -> ProductRecord {
        let mut copy = record.clone();
        if !needs_visit(record) {
            return copy;
        }
        if self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            debug!("Deadline passed, leaving {} as is", record.link);
            return copy;
        }

        match self.visit(&record.link).await {
            Ok(details) => apply(&mut copy, details),
            Err(e) => warn!("Detail page {} could not be read: {}", record.link, e),
        }
        copy
    }

    async fn visit(&self, link: &str) -> Result<DetailFields, ScanError> {
        let mut session = load_page(self.driver.as_ref(), link, self.settle).await?;
        let html = session.content().await;
        release(session, link).await;
        Ok(self.read_details(&html?))
    }

    pub fn read_details(&self, html: &str) -> DetailFields {
        let document = Html::parse_document(html);

        let availability = document
            .select(&self.availability)
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty())
            .unwrap_or_default();

        let specs = document
            .select(&self.spec_items)
            .map(rendered_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        DetailFields {
            availability,
            specs,
        }
    }
}

fn needs_visit(record: &ProductRecord) -> bool {
    record.missing_details() && !record.link.is_empty()
}

/// Fill only the fields that are still empty.
fn apply(record: &mut ProductRecord, details: DetailFields) {
    if record.availability.is_empty() && !details.availability.is_empty() {
        record.availability = details.availability;
    }
    if record.specs.is_empty() && !details.specs.is_empty() {
        record.specs = details.specs;
    }
}

fn parse(selector: &str) -> Result<Selector, ScanError> {
    Selector::parse(selector).map_err(|_| ScanError::Selector(selector.to_string()))
}
