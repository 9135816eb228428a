use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("Resolving {host} timed out after {after:?}")]
    Timeout { host: String, after: std::time::Duration },
}

pub type Result<T> = std::result::Result<T, ScanError>;
