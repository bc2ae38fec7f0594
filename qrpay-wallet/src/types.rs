//! Values exchanged with the wallet collaborators

use chrono::{DateTime, Utc};
use qrpay_uri::PaymentIntent;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::format::{format_usd, mask_address};

/// Account whose funds back the transfer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(String);

impl AccountRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex addresses compare without regard to checksum casing
    pub fn matches(&self, address: &str) -> bool {
        self.0.eq_ignore_ascii_case(address)
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountRef {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Transfer handed to the submission collaborator
///
/// Only built by the orchestrator from an intent that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    recipient_address: String,
    amount: u64,
    chain_id: u64,
    token_address: String,
}

impl TransferRequest {
    pub(crate) fn from_validated(intent: &PaymentIntent) -> Self {
        Self {
            recipient_address: intent.recipient_address.clone(),
            amount: intent.raw_amount,
            chain_id: intent.chain_id,
            token_address: intent.token_address.clone(),
        }
    }

    pub fn recipient_address(&self) -> &str {
        &self.recipient_address
    }

    /// Amount in smallest units
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Token contract for transfer-form requests, the recipient otherwise
    pub fn token_address(&self) -> &str {
        &self.token_address
    }
}

/// Acknowledgement from the submission collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub transaction_hash: String,
}

/// Direction of a transfer relative to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// One entry of the account's transfer history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub direction: Direction,
    /// Amount in display units
    pub amount: Decimal,
    /// The other side of the transfer
    pub counterparty: String,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
}

impl TransactionRecord {
    /// `"To 0x1c7D...7238"` or `"From 0x1c7D...7238"`
    pub fn description(&self) -> String {
        let prefix = match self.direction {
            Direction::Outgoing => "To",
            Direction::Incoming => "From",
        };
        format!("{} {}", prefix, mask_address(&self.counterparty))
    }

    /// `"-$50.00"` or `"+$1,250.00"`
    pub fn signed_amount(&self) -> String {
        let sign = match self.direction {
            Direction::Outgoing => '-',
            Direction::Incoming => '+',
        };
        format!("{}{}", sign, format_usd(self.amount))
    }
}
