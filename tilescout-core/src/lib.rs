pub mod enrich;
pub mod error;
pub mod report;
pub mod scrape;

use std::path::Path;

pub use error::ScrapeError;
pub use scrape::{RunMode, ScrapeOptions, ScrapeOutcome, Scraper, execute_scrape};
pub use tilescout_scanner::{ProductRecord, SiteProfile};

/// The profile at `path`, or the built-in one when no path is given.
pub fn load_profile(path: Option<&Path>) -> error::Result<SiteProfile> {
    match path {
        Some(path) => SiteProfile::from_path(path)
            .map_err(|e| ScrapeError::Profile(format!("{}: {}", path.display(), e))),
        None => Ok(SiteProfile::default()),
    }
}
