use crate::classifier::{PageClassifier, PageSnapshot, TileSignalClassifier, parse_selector};
use crate::driver::{BrowserDriver, PageSession, load_page, release};
use crate::error::{Result, ScanError};
use crate::normalize::{UrlNormalizer, extract_url_path};
use crate::profile::SiteProfile;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Called with (depth, url) each time a page is scanned for children.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// A category page found during the breadth-first walk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryNode {
    pub url: String,
    pub depth: usize,
}

/// Everything one discovery run learned.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Pages that passed the classifier, in discovery order.
    pub listings: Vec<String>,
    /// Every category URL seen, before classification.
    pub discovered: Vec<String>,
    /// Pages whose links were scanned, with the level they were scanned at.
    pub expanded: Vec<CategoryNode>,
    /// True when the deadline cut the run short.
    pub cancelled: bool,
}

/// Rules an anchor target must satisfy to count as a child category.
#[derive(Debug, Clone)]
pub struct LinkRules {
    normalizer: UrlNormalizer,
    product_marker: String,
    anchors: Selector,
}

impl LinkRules {
    pub fn new(normalizer: UrlNormalizer, product_marker: &str) -> Result<Self> {
        Ok(Self {
            normalizer,
            product_marker: product_marker.to_string(),
            anchors: parse_selector("a[href]")?,
        })
    }

    /// Child category links of the page at `page_url`, normalized and
    /// deduplicated in document order.
    pub fn category_links(&self, html: &str, page_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let scope = base.path().to_string();

        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for anchor in document.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(link) = self.accept(&base, &scope, href)
                && seen.insert(link.clone())
            {
                links.push(link);
            }
        }
        links
    }

    fn accept(&self, base: &Url, scope: &str, href: &str) -> Option<String> {
        let target = base.join(href.trim()).ok()?;
        if target.query().is_some() || target.fragment().is_some() {
            return None;
        }

        let path = target.path();
        if !path.starts_with(scope)
            || !self.normalizer.is_category_path(path)
            || path.contains(&self.product_marker)
        {
            return None;
        }

        self.normalizer.try_normalize(target.as_str())
    }
}

pub struct Crawler<D: BrowserDriver> {
    driver: Arc<D>,
    normalizer: UrlNormalizer,
    rules: LinkRules,
    classifier: Arc<dyn PageClassifier>,
    max_depth: usize,
    workers: usize,
    settle: Duration,
    deadline: Option<Instant>,
    progress_callback: Option<ProgressCallback>,
}

impl<D: BrowserDriver> Crawler<D> {
    pub fn new(driver: Arc<D>, profile: &SiteProfile) -> Result<Self> {
        let normalizer = profile.normalizer();
        Ok(Self {
            driver,
            rules: LinkRules::new(normalizer.clone(), &profile.product_marker)?,
            normalizer,
            classifier: Arc::new(TileSignalClassifier::from_profile(profile)?),
            max_depth: 2,
            workers: 1,
            settle: Duration::from_millis(900),
            deadline: None,
            progress_callback: None,
        })
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Breadth-first walk from `root`, then keep the pages that classify as
    /// listings.
    pub async fn discover(&self, root: &str) -> Result<Discovery> {
        let root = self
            .normalizer
            .try_normalize(root)
            .ok_or_else(|| ScanError::InvalidUrl(root.to_string()))?;

        info!(
            "Starting discovery of {} (max depth {}, {} workers)",
            root, self.max_depth, self.workers
        );

        let mut result = Discovery::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut discovered: HashSet<String> = HashSet::new();
        let mut frontier = vec![root];
        let mut depth = 0;

        while !frontier.is_empty() && depth <= self.max_depth {
            if self.deadline_passed() {
                warn!("Deadline reached at depth {}, stopping discovery", depth);
                result.cancelled = true;
                break;
            }

            let level: Vec<String> = frontier
                .drain(..)
                .filter(|url| visited.insert(url.clone()))
                .collect();

            debug!("Depth {}: scanning {} pages", depth, level.len());

            let scans: Vec<(String, Result<Vec<String>>)> = stream::iter(level)
                .map(|url| async move {
                    let children = self.scan_children(&url, depth).await;
                    (url, children)
                })
                .buffered(self.workers)
                .collect()
                .await;

            let mut next = Vec::new();
            for (url, children) in scans {
                result.expanded.push(CategoryNode {
                    url: url.clone(),
                    depth,
                });

                let children = match children {
                    Ok(children) => children,
                    Err(e) => {
                        warn!("Category scan failed for {}: {}", url, e);
                        continue;
                    }
                };

                for child in children {
                    if !visited.contains(&child) {
                        next.push(child.clone());
                    }
                    if discovered.insert(child.clone()) {
                        result.discovered.push(child);
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        info!(
            "Discovered {} category pages, checking which are listings",
            result.discovered.len()
        );

        let (listings, cut_short) = self.filter_listings(&result.discovered).await;
        result.listings = listings;
        result.cancelled |= cut_short;

        info!("Discovery complete. {} listing pages", result.listings.len());
        Ok(result)
    }

    /// Load one page and classify it. Failures count as "not a listing".
    pub async fn is_listing(&self, url: &str) -> bool {
        match self.classify(url).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Classification of {} failed: {}", url, e);
                false
            }
        }
    }

    async fn classify(&self, url: &str) -> Result<bool> {
        let mut session = load_page(self.driver.as_ref(), url, self.settle).await?;
        let snapshot = PageSnapshot::capture(&mut session, url).await;
        release(session, url).await;
        Ok(self.classifier.is_listing(&snapshot?))
    }

    /// Classify every candidate once, keeping input order.
    async fn filter_listings(&self, candidates: &[String]) -> (Vec<String>, bool) {
        let checks: Vec<Option<(String, bool)>> = stream::iter(candidates.iter().cloned())
            .map(|url| async move {
                if self.deadline_passed() {
                    return None;
                }
                let listing = self.is_listing(&url).await;
                Some((url, listing))
            })
            .buffered(self.workers)
            .collect()
            .await;

        let cut_short = checks.iter().any(Option::is_none);
        if cut_short {
            warn!("Deadline reached while classifying, some pages were skipped");
        }

        let listings = checks
            .into_iter()
            .flatten()
            .filter_map(|(url, listing)| listing.then_some(url))
            .collect();
        (listings, cut_short)
    }

    async fn scan_children(&self, url: &str, depth: usize) -> Result<Vec<String>> {
        if let Some(ref callback) = self.progress_callback {
            callback(depth, url.to_string());
        }

        let mut session = load_page(self.driver.as_ref(), url, self.settle).await?;
        let html = session.content().await;
        release(session, url).await;

        let links = self.rules.category_links(&html?, url);
        debug!(
            "Found {} child categories under {}",
            links.len(),
            extract_url_path(url)
        );
        Ok(links)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}
