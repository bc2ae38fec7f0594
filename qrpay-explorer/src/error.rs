//! Explorer client errors

use qrpay_wallet::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExplorerError {
    /// Transport failure or non-success HTTP status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with `status != "1"`
    #[error("Explorer API error: {message} ({detail})")]
    Api { message: String, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token descriptor not of the form `chainId:contract:decimals`
    #[error("Invalid token descriptor: {0}")]
    InvalidToken(String),
}

pub type ExplorerResult<T> = std::result::Result<T, ExplorerError>;

impl From<ExplorerError> for SourceError {
    fn from(err: ExplorerError) -> Self {
        match err {
            ExplorerError::Http(e) if e.is_status() => SourceError::Rejected(e.to_string()),
            ExplorerError::Http(e) => SourceError::Network(e.to_string()),
            ExplorerError::Api { .. } => SourceError::Rejected(err.to_string()),
            ExplorerError::InvalidResponse(_)
            | ExplorerError::Json(_)
            | ExplorerError::InvalidToken(_) => SourceError::InvalidResponse(err.to_string()),
        }
    }
}
