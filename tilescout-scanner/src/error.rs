use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        ScanError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
