//! # Wallet-side handling of scanned payment requests
//!
//! [`TransferOrchestrator`] takes the string a QR scanner produced, parses it
//! with [`qrpay_uri`], checks the account balance through a [`BalanceSource`]
//! and, once the user confirms, hands a [`TransferRequest`] to a
//! [`TransferSubmitter`].
//!
//! The orchestrator never signs or broadcasts anything itself. Balances,
//! submission and history sit behind async traits so the same flow runs
//! against a block explorer, a wallet SDK or the in-memory doubles in
//! [`memory`].
//!
//! ## Example
//!
//! ```no_run
//! use qrpay_wallet::memory::{MemoryBalanceSource, MemorySubmitter};
//! use qrpay_wallet::{AccountRef, TransferOrchestrator};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> Result<(), qrpay_wallet::FlowError> {
//! let account = AccountRef::new("0x5DFE0A60d3c27976eb3F1530F8a1CfA4bE2BAD30");
//! let balances = MemoryBalanceSource::with_balance(&account, Decimal::from(100));
//! let flow = TransferOrchestrator::new(account, balances, MemorySubmitter::new());
//!
//! flow.handle_scan("ethereum:0xAAA@8453/transfer?address=0xBBB&uint256=5000000")
//!     .await?;
//! if flow.snapshot().can_confirm() {
//!     let receipt = flow.confirm().await?;
//!     println!("submitted {}", receipt.transaction_hash);
//! }
//! # Ok(())
//! # }
//! ```

mod balance;
mod collaborators;
mod error;
mod format;
pub mod memory;
mod orchestrator;
mod types;
mod validator;

pub use balance::AggregateBalanceSource;
pub use collaborators::{BalanceSource, TransactionHistory, TransferSubmitter};
pub use error::{FlowError, FlowResult, SourceError, SubmissionError, ValidationError};
pub use format::{format_relative_date, format_usd, mask_address};
pub use orchestrator::{
    FlowId, FlowPhase, FlowSnapshot, TransferOrchestrator, CHECK_ABANDONED_MESSAGE,
    MISSING_RECIPIENT_MESSAGE, SUBMISSION_UNKNOWN_MESSAGE,
};
pub use types::{AccountRef, Direction, SubmissionReceipt, TransactionRecord, TransferRequest};
pub use validator::{BalanceValidator, ValidationResult, INSUFFICIENT_BALANCE_MESSAGE};

pub use qrpay_uri::{ParseError, PaymentIntent};
