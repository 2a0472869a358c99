pub mod classifier;
pub mod crawler;
pub mod driver;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pagination;
pub mod profile;
pub mod result;

#[cfg(feature = "browser")]
pub mod chrome;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use classifier::{PageClassifier, PageSnapshot, TileSignalClassifier};
pub use crawler::{CategoryNode, Crawler, Discovery, ProgressCallback};
pub use driver::{BrowserDriver, PageSession};
pub use error::ScanError;
pub use extract::{FallbackChain, RecordExtractor};
pub use normalize::UrlNormalizer;
pub use pagination::{PaginationConfig, Paginator, Saturation, StopReason};
pub use profile::SiteProfile;
pub use result::ProductRecord;

#[cfg(feature = "browser")]
pub use chrome::{ChromeConfig, ChromeDriver};
