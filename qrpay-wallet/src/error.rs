//! Error types for validation, submission and flow control

use qrpay_uri::ParseError;
use thiserror::Error;

use crate::FlowPhase;

/// Failure reported by a balance or history collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered with something that could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The remote understood the request and refused it
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// The balance check could not be performed
///
/// Insufficient funds is not an error; it is reported through
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(#[from] SourceError),
}

/// Failure reported by the transaction submission collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Insufficient on-chain funds")]
    InsufficientFunds,

    #[error("Insufficient funds for gas")]
    InsufficientGas,

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The wallet refused to sign or the user declined in the wallet UI
    #[error("Submission rejected: {0}")]
    Rejected(String),
}

/// Errors returned by [`TransferOrchestrator`](crate::TransferOrchestrator) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// Another payment is in flight
    #[error("A transfer is already in progress ({0})")]
    Busy(FlowPhase),

    /// The scanned string is not a payment request
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The requested action is not allowed in the current state
    #[error("Not ready: {0}")]
    NotReady(&'static str),

    /// The flow was cancelled or superseded while the operation was suspended
    #[error("Flow cancelled")]
    Cancelled,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Result type for orchestrator operations
pub type FlowResult<T> = std::result::Result<T, FlowError>;
