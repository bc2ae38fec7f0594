//! Error types for payment-request URIs

use thiserror::Error;

/// Result type alias for URI operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that can occur while parsing or building a payment-request URI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `@` separates the target address from the chain id
    #[error("Invalid payment URI: missing chainId")]
    MissingChainId,

    /// No `/` follows the chain id
    #[error("Invalid payment URI: missing path")]
    MissingPath,

    /// A numeric field holds something other than a non-negative integer
    #[error("Invalid number in `{field}`: {value:?}")]
    InvalidNumber {
        field: &'static str,
        value: String,
    },

    /// Display amount could not be converted to smallest units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount has more decimal places than the token supports
    #[error("Amount has too many decimal places (max 6): {0}")]
    TooManyDecimalPlaces(String),

    /// Required builder input was not provided
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

impl ParseError {
    /// Name of the offending field, when the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ParseError::InvalidNumber { field, .. } => Some(field),
            ParseError::MissingParameter(field) => Some(field),
            _ => None,
        }
    }
}
