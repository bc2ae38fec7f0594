//! # Payment-request URIs for QR-driven stablecoin transfers
//!
//! This crate turns the string a QR scanner hands over into a structured
//! [`PaymentIntent`], and builds the same kind of string for the receiving side.
//!
//! ## URI Format
//!
//! ```text
//! [scheme:]address@chainId/method?query
//! ethereum:0xTOKEN@8453/transfer?address=0xRECIPIENT&uint256=5000000
//! 0xRECIPIENT@11155111/?value=250000
//! ```
//!
//! Amounts are carried in the token's smallest unit. Stablecoins use six decimals,
//! so `uint256=5000000` is 5.00.
//!
//! Parsing is pure and synchronous; it can be run on every scan result before
//! deciding whether to show a confirmation screen.

mod amount;
mod error;
mod intent;
mod uri;

pub use amount::{format_display_amount, parse_display_amount, to_display_amount};
pub use error::{ParseError, Result};
pub use intent::{PaymentIntent, PaymentMethod};
pub use uri::{parse_uri, PaymentRequestBuilder};

/// Smallest units per display unit (six decimals)
pub const SCALE: u64 = 1_000_000;

/// Decimal places implied by [`SCALE`]
pub const AMOUNT_DECIMALS: u32 = 6;

/// Chain used when the URI leaves the chain id empty (Base mainnet)
pub const DEFAULT_CHAIN_ID: u64 = 8453;

/// Scheme written by [`PaymentRequestBuilder`]
pub const ETHEREUM_SCHEME: &str = "ethereum";

/// Method name of the token transfer form
pub const TRANSFER_METHOD: &str = "transfer";

/// Optional prefix on the target address
pub const PAY_PREFIX: &str = "pay-";
