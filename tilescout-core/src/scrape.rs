use crate::enrich::DetailEnricher;
use crate::error::{Result, ScrapeError};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tilescout_scanner::crawler::Discovery;
use tilescout_scanner::driver::{BrowserDriver, load_page, release};
use tilescout_scanner::normalize::{UrlNormalizer, extract_url_path};
use tilescout_scanner::{
    Crawler, PageClassifier, PaginationConfig, Paginator, ProductRecord, RecordExtractor,
    Saturation, SiteProfile, StopReason, TileSignalClassifier,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Options for configuring a scrape run
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub start_url: String,
    pub max_depth: usize,
    pub workers: usize,
    /// Wait after every navigation before the DOM is read.
    pub settle: Duration,
    /// Pause a worker takes between two consecutive targets.
    pub cooldown: Duration,
    pub pagination: PaginationTiming,
    pub max_steps: usize,
    /// Wall-clock budget for the whole run.
    pub budget: Option<Duration>,
    pub enrich: bool,
    pub show_progress_bars: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationTiming {
    pub settle: Duration,
    pub reveal_settle: Duration,
    pub scroll_settle: Duration,
}

impl Default for PaginationTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1500),
            reveal_settle: Duration::from_millis(300),
            scroll_settle: Duration::from_millis(500),
        }
    }
}

impl ScrapeOptions {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            max_depth: 2,
            workers: 1,
            settle: Duration::from_millis(900),
            cooldown: Duration::from_millis(600),
            pagination: PaginationTiming::default(),
            max_steps: 500,
            budget: None,
            enrich: false,
            show_progress_bars: false,
        }
    }

    /// Drop every fixed wait. For deterministic drivers.
    pub fn without_delays(mut self) -> Self {
        self.settle = Duration::ZERO;
        self.cooldown = Duration::ZERO;
        self.pagination = PaginationTiming {
            settle: Duration::ZERO,
            reveal_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        };
        self
    }
}

/// How the start URL was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Start URL is the category tree root.
    FullTree,
    /// Start URL is itself a listing.
    SinglePage,
    /// Start URL is a category hub; only listings below it are kept.
    Subtree,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::FullTree => "full-tree",
            RunMode::SinglePage => "single-page",
            RunMode::Subtree => "subtree",
        }
    }
}

/// What happened on one target page.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub url: String,
    pub records: usize,
    pub saturation: Option<Saturation>,
}

#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub start_url: String,
    pub mode: RunMode,
    pub targets: Vec<String>,
    pub pages: Vec<PageSummary>,
    pub records: Vec<ProductRecord>,
    /// Copy of `records` with detail-page fields filled in, when enrichment
    /// ran. `records` itself is never modified by enrichment.
    pub enriched: Option<Vec<ProductRecord>>,
    /// True when the run budget stopped work early. Records gathered before
    /// that point are still in `records`.
    pub cancelled: bool,
}

/// Callback for reporting scrape progress
pub type ScrapeProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct Scraper<D: BrowserDriver> {
    driver: Arc<D>,
    profile: SiteProfile,
    options: ScrapeOptions,
    normalizer: UrlNormalizer,
    classifier: Arc<dyn PageClassifier>,
    extractor: RecordExtractor,
    deadline: Option<Instant>,
    discovery_callback: Option<tilescout_scanner::ProgressCallback>,
    progress_callback: Option<ScrapeProgressCallback>,
}

impl<D: BrowserDriver> Scraper<D> {
    pub fn new(driver: Arc<D>, profile: SiteProfile, options: ScrapeOptions) -> Result<Self> {
        let deadline = options.budget.map(|budget| Instant::now() + budget);
        Ok(Self {
            driver,
            normalizer: profile.normalizer(),
            classifier: Arc::new(TileSignalClassifier::from_profile(&profile)?),
            extractor: RecordExtractor::from_profile(&profile)?,
            profile,
            options,
            deadline,
            discovery_callback: None,
            progress_callback: None,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_discovery_callback(
        mut self,
        callback: tilescout_scanner::ProgressCallback,
    ) -> Self {
        self.discovery_callback = Some(callback);
        self
    }

    pub fn with_progress_callback(mut self, callback: ScrapeProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn crawler(&self) -> Result<Crawler<D>> {
        let mut crawler = Crawler::new(self.driver.clone(), &self.profile)?
            .with_max_depth(self.options.max_depth)
            .with_workers(self.options.workers)
            .with_classifier(self.classifier.clone())
            .with_settle(self.options.settle)
            .with_deadline(self.deadline);
        if let Some(ref callback) = self.discovery_callback {
            crawler = crawler.with_progress_callback(callback.clone());
        }
        Ok(crawler)
    }

    fn paginator(&self) -> Paginator {
        let timing = self.options.pagination;
        let mut config = PaginationConfig::from_profile(&self.profile)
            .with_max_steps(self.options.max_steps)
            .with_deadline(self.deadline);
        config.settle = timing.settle;
        config.reveal_settle = timing.reveal_settle;
        config.scroll_settle = timing.scroll_settle;
        Paginator::new(config)
    }

    fn report(&self, message: String) {
        if let Some(ref callback) = self.progress_callback {
            callback(message);
        }
    }

    fn start(&self) -> Result<String> {
        self.normalizer
            .try_normalize(&self.options.start_url)
            .ok_or_else(|| ScrapeError::InvalidStart(self.options.start_url.clone()))
    }

    /// One classification of the start URL.
    pub async fn classify_start(&self) -> Result<bool> {
        let start = self.start()?;
        Ok(self.crawler()?.is_listing(&start).await)
    }

    /// Discovery rooted at the start URL, no mode selection.
    pub async fn discover(&self) -> Result<Discovery> {
        let start = self.start()?;
        Ok(self.crawler()?.discover(&start).await?)
    }

    /// Pick the run mode and resolve it into target listing URLs.
    pub async fn select_targets(&self) -> Result<(RunMode, Vec<String>, bool)> {
        let start = self.start()?;
        let crawler = self.crawler()?;

        if self.normalizer.is_root_category(&start) {
            info!("{} is the category root, running full discovery", start);
            let discovery = crawler.discover(&start).await?;
            return Ok((RunMode::FullTree, discovery.listings, discovery.cancelled));
        }

        if crawler.is_listing(&start).await {
            info!("{} is a listing page, scraping it alone", start);
            return Ok((RunMode::SinglePage, vec![start], false));
        }

        info!("{} is a category hub, discovering its subtree", start);
        let discovery = crawler.discover(&start).await?;
        let targets = subtree_targets(&start, discovery.listings);
        Ok((RunMode::Subtree, targets, discovery.cancelled))
    }

    /// Load one listing, drive it to saturation and read its cards.
    pub async fn scrape_target(&self, url: &str) -> Result<(Vec<ProductRecord>, Saturation)> {
        let mut session = load_page(self.driver.as_ref(), url, self.options.settle).await?;

        let saturation = match self.paginator().saturate(&mut session).await {
            Ok(saturation) => saturation,
            Err(e) => {
                release(session, url).await;
                return Err(e.into());
            }
        };
        let records = self.extractor.extract(&mut session, url).await;
        release(session, url).await;

        let records = records?;
        debug!(
            "{}: {} cards after {} pagination steps",
            extract_url_path(url),
            records.len(),
            saturation.steps
        );
        Ok((records, saturation))
    }

    /// Mode selection, then saturate-and-extract over every target.
    pub async fn run(&self) -> Result<ScrapeOutcome> {
        let start = self.start()?;
        let (mode, targets, mut cancelled) = self.select_targets().await?;
        info!("{} mode, {} target pages", mode.as_str(), targets.len());

        let total = targets.len();
        let workers = self.options.workers.max(1);

        let visits: Vec<Option<(PageSummary, Vec<ProductRecord>)>> =
            stream::iter(targets.iter().enumerate())
                .map(|(idx, url)| async move {
                    // a slot that already served a target pauses first
                    if idx >= workers && !self.options.cooldown.is_zero() {
                        tokio::time::sleep(self.options.cooldown).await;
                    }
                    if self.deadline_passed() {
                        return None;
                    }

                    self.report(format!("Scraping {}/{}: {}", idx + 1, total, url));
                    Some(self.visit(url).await)
                })
                .buffered(workers)
                .collect()
                .await;

        let mut pages = Vec::new();
        let mut records = Vec::new();
        for visit in visits {
            match visit {
                Some((summary, page_records)) => {
                    if summary
                        .saturation
                        .as_ref()
                        .is_some_and(|s| s.reason == StopReason::Deadline)
                    {
                        cancelled = true;
                    }
                    records.extend(page_records);
                    pages.push(summary);
                }
                None => cancelled = true,
            }
        }

        if cancelled {
            warn!("Run budget exhausted, keeping {} records", records.len());
        }

        let enriched = if self.options.enrich {
            self.report(format!("Enriching {} records", records.len()));
            let enricher = DetailEnricher::new(self.driver.clone(), &self.profile)?
                .with_settle(self.options.settle)
                .with_workers(workers)
                .with_deadline(self.deadline);
            Some(enricher.enrich(&records).await)
        } else {
            None
        };

        Ok(ScrapeOutcome {
            start_url: start,
            mode,
            targets,
            pages,
            records,
            enriched,
            cancelled,
        })
    }

    async fn visit(&self, url: &str) -> (PageSummary, Vec<ProductRecord>) {
        match self.scrape_target(url).await {
            Ok((records, saturation)) => (
                PageSummary {
                    url: url.to_string(),
                    records: records.len(),
                    saturation: Some(saturation),
                },
                records,
            ),
            Err(e) => {
                warn!("Scraping {} failed, no records from it: {}", url, e);
                (
                    PageSummary {
                        url: url.to_string(),
                        records: 0,
                        saturation: None,
                    },
                    Vec::new(),
                )
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Listings that live under `start`, in discovery order.
pub fn subtree_targets(start: &str, listings: Vec<String>) -> Vec<String> {
    listings
        .into_iter()
        .filter(|url| url.starts_with(start))
        .collect()
}

/// Execute a scrape with the given options
/// Returns the accumulated records and per-page summaries
pub async fn execute_scrape<D: BrowserDriver>(
    driver: Arc<D>,
    profile: SiteProfile,
    options: ScrapeOptions,
    progress_callback: Option<ScrapeProgressCallback>,
) -> Result<ScrapeOutcome> {
    let show_progress_bars = options.show_progress_bars;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Starting scrape...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(Arc::new(pb))
    } else {
        None
    };

    let scanned_count = Arc::new(AtomicUsize::new(0));

    let discovery_callback: tilescout_scanner::ProgressCallback = match progress_bar.clone() {
        Some(pb) => {
            let count = scanned_count.clone();
            Arc::new(move |depth: usize, url: String| {
                let n = count.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!(
                    "Discovering categories... {} pages (depth {}) {}",
                    n,
                    depth,
                    extract_url_path(&url)
                ));
            })
        }
        None => Arc::new(|_depth: usize, _url: String| {}),
    };

    let outer = progress_callback.clone();
    let pb_clone = progress_bar.clone();
    let scrape_callback: ScrapeProgressCallback = Arc::new(move |message: String| {
        if let Some(ref pb) = pb_clone {
            pb.set_message(message.clone());
        }
        if let Some(ref callback) = outer {
            callback(message);
        }
    });

    let scraper = Scraper::new(driver, profile, options)?
        .with_discovery_callback(discovery_callback)
        .with_progress_callback(scrape_callback);

    let outcome = scraper.run().await;

    if let Some(ref pb) = progress_bar {
        match outcome {
            Ok(ref outcome) => pb.finish_with_message(format!(
                "Scrape complete! {} records from {} pages",
                outcome.records.len(),
                outcome.pages.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    outcome
}
