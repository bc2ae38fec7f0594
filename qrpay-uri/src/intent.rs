//! Structured payment intents decoded from scanned URIs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TRANSFER_METHOD;

/// How the URI encodes recipient and amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Token `transfer` call: recipient in `address`, amount in `uint256`
    Transfer,
    /// Direct value form: recipient is the URI target, amount in `value`.
    /// Carries the raw method text, which is usually empty.
    Direct(String),
}

impl PaymentMethod {
    /// Classify a method path segment
    pub fn from_path(method: &str) -> Self {
        if method == TRANSFER_METHOD {
            PaymentMethod::Transfer
        } else {
            PaymentMethod::Direct(method.to_string())
        }
    }

    /// The method text as it appears in the URI
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Transfer => TRANSFER_METHOD,
            PaymentMethod::Direct(method) => method,
        }
    }

    /// Whether this is the token `transfer` form
    pub fn is_transfer(&self) -> bool {
        matches!(self, PaymentMethod::Transfer)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed payment request
///
/// Created once per successful scan and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Account that receives the funds; empty when the URI omitted it
    pub recipient_address: String,
    /// Target network
    pub chain_id: u64,
    /// Encoding form of the request
    pub method: PaymentMethod,
    /// Amount in the token's smallest unit
    pub raw_amount: u64,
    /// `raw_amount / SCALE`
    pub display_amount: Decimal,
    /// URI target: the token contract for transfers, the recipient otherwise
    pub token_address: String,
    /// Scheme prefix that was stripped, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_client: Option<String>,
}

impl PaymentIntent {
    /// Whether the intent names someone to pay
    pub fn has_recipient(&self) -> bool {
        !self.recipient_address.trim().is_empty()
    }

    /// Short form for logs and confirmation screens
    pub fn summary(&self) -> String {
        format!(
            "{} to {} on chain {}",
            crate::format_display_amount(self.raw_amount),
            if self.has_recipient() {
                self.recipient_address.as_str()
            } else {
                "<none>"
            },
            self.chain_id
        )
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
