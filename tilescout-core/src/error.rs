use thiserror::Error;
use tilescout_scanner::ScanError;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Scanner error: {0}")]
    Scan(#[from] ScanError),

    #[error("Invalid start URL: {0}")]
    InvalidStart(String),

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
