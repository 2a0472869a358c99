//! Drives a listing page until its "load more" content is exhausted.

use crate::driver::PageSession;
use crate::error::Result;
use crate::profile::SiteProfile;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Loading,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No trigger left and the viewport sits at the bottom.
    Exhausted,
    /// The step budget ran out first.
    StepBudget,
    /// The run deadline passed first.
    Deadline,
    /// Scrolling stopped working; the page is read as it stands.
    Stalled,
}

#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub trigger_selector: String,
    pub tile_selector: String,
    /// Wait after a trigger click for new cards to render.
    pub settle: Duration,
    /// Wait after scrolling the trigger into view, before clicking.
    pub reveal_settle: Duration,
    /// Wait after an incremental scroll.
    pub scroll_settle: Duration,
    pub scroll_delta: f64,
    pub max_steps: usize,
    pub deadline: Option<Instant>,
}

impl PaginationConfig {
    pub fn from_profile(profile: &SiteProfile) -> Self {
        Self {
            trigger_selector: profile.trigger_selector.clone(),
            tile_selector: profile.tile_selector.clone(),
            settle: Duration::from_millis(1500),
            reveal_settle: Duration::from_millis(300),
            scroll_settle: Duration::from_millis(500),
            scroll_delta: 540.0,
            max_steps: 500,
            deadline: None,
        }
    }

    /// Same selectors, no waiting. Useful against deterministic drivers.
    pub fn without_delays(mut self) -> Self {
        self.settle = Duration::ZERO;
        self.reveal_settle = Duration::ZERO;
        self.scroll_settle = Duration::ZERO;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// What one `saturate` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saturation {
    pub steps: usize,
    pub clicks: usize,
    pub scrolls: usize,
    pub reason: StopReason,
}

enum StepOutcome {
    Clicked,
    Scrolled,
    Finished,
    Stalled,
}

pub struct Paginator {
    config: PaginationConfig,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Run the Loading/Done state machine on an already loaded page.
    pub async fn saturate<S: PageSession>(&self, page: &mut S) -> Result<Saturation> {
        let mut state = PaginationState::Loading;
        let mut result = Saturation {
            steps: 0,
            clicks: 0,
            scrolls: 0,
            reason: StopReason::Exhausted,
        };

        while state == PaginationState::Loading {
            if self.deadline_passed() {
                warn!("Deadline reached after {} pagination steps", result.steps);
                result.reason = StopReason::Deadline;
                break;
            }
            if result.steps >= self.config.max_steps {
                warn!(
                    "Pagination step budget of {} exhausted, keeping current cards",
                    self.config.max_steps
                );
                result.reason = StopReason::StepBudget;
                break;
            }

            result.steps += 1;
            match self.step(page).await? {
                StepOutcome::Clicked => result.clicks += 1,
                StepOutcome::Scrolled => result.scrolls += 1,
                StepOutcome::Finished => state = PaginationState::Done,
                StepOutcome::Stalled => {
                    result.reason = StopReason::Stalled;
                    state = PaginationState::Done;
                }
            }
        }

        self.reveal_tiles(page).await;

        info!(
            "Pagination finished after {} steps ({} clicks, {} scrolls)",
            result.steps, result.clicks, result.scrolls
        );
        Ok(result)
    }

    async fn step<S: PageSession>(&self, page: &mut S) -> Result<StepOutcome> {
        let trigger = match page.query(&self.config.trigger_selector).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Trigger lookup failed, treating as absent: {}", e);
                None
            }
        };

        if let Some(trigger) = trigger
            && self.activate(page, &trigger).await
        {
            sleep(self.config.settle).await;
            return Ok(StepOutcome::Clicked);
        }

        match page.at_bottom().await {
            Ok(true) => Ok(StepOutcome::Finished),
            Ok(false) => match page.scroll(self.config.scroll_delta).await {
                Ok(()) => {
                    sleep(self.config.scroll_settle).await;
                    Ok(StepOutcome::Scrolled)
                }
                Err(e) => {
                    warn!("Scrolling failed, keeping current cards: {}", e);
                    Ok(StepOutcome::Stalled)
                }
            },
            Err(e) => {
                warn!("Could not read scroll position, stopping: {}", e);
                Ok(StepOutcome::Finished)
            }
        }
    }

    /// Direct click first, positional click on the element's centre second.
    async fn activate<S: PageSession>(&self, page: &mut S, trigger: &S::Element) -> bool {
        if let Err(e) = page.scroll_into_view(trigger).await {
            debug!("Scrolling trigger into view failed: {}", e);
        }
        sleep(self.config.reveal_settle).await;

        match page.click(trigger).await {
            Ok(()) => return true,
            Err(e) => debug!("Direct trigger click failed, trying positional click: {}", e),
        }

        match page.bounding_box(trigger).await {
            Ok(Some(bbox)) => {
                let (x, y) = bbox.center();
                match page.click_at(x, y).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Positional trigger click failed: {}", e);
                        false
                    }
                }
            }
            Ok(None) => false,
            Err(e) => {
                debug!("Trigger has no geometry: {}", e);
                false
            }
        }
    }

    /// Some tiles only fill in their data once they were on screen.
    async fn reveal_tiles<S: PageSession>(&self, page: &mut S) {
        let tiles = match page.query_all(&self.config.tile_selector).await {
            Ok(tiles) => tiles,
            Err(e) => {
                debug!("Tile lookup failed: {}", e);
                return;
            }
        };

        for tile in &tiles {
            if let Err(e) = page.scroll_into_view(tile).await {
                debug!("Scrolling tile into view failed: {}", e);
            }
        }
        sleep(self.config.reveal_settle).await;
    }

    fn deadline_passed(&self) -> bool {
        self.config
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
