//! Parsing and generation of payment-request URIs
//!
//! ## URI Format
//!
//! ```text
//! ethereum:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913@8453/transfer?address=0x5DFE...&uint256=5000000
//! 0xCCC@11155111/?value=250000
//! ```
//!
//! The scheme prefix is optional. The segment between `@` and `/` is the chain id,
//! the path segment selects the method and the query carries amounts and recipients.

use std::collections::HashMap;
use std::str::FromStr;

use url::form_urlencoded;

use crate::{
    to_display_amount, ParseError, PaymentIntent, PaymentMethod, Result, DEFAULT_CHAIN_ID,
    ETHEREUM_SCHEME, PAY_PREFIX, TRANSFER_METHOD,
};

/// Parse a scanned payment-request URI into a [`PaymentIntent`]
pub fn parse_uri(uri_str: &str) -> Result<PaymentIntent> {
    let (scheme, body) = strip_scheme(uri_str.trim());

    let (address_part, rest) = body.split_once('@').ok_or(ParseError::MissingChainId)?;
    let (chain_part, path_and_params) = rest.split_once('/').ok_or(ParseError::MissingPath)?;
    let (method, query) = path_and_params
        .split_once('?')
        .unwrap_or((path_and_params, ""));

    let address_part = address_part.strip_prefix(PAY_PREFIX).unwrap_or(address_part);

    let chain_id = if chain_part.is_empty() {
        DEFAULT_CHAIN_ID
    } else {
        parse_integer("chainId", chain_part)?
    };

    // Later duplicates overwrite earlier ones
    let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let method = PaymentMethod::from_path(method);
    let (raw_amount, recipient_address) = match method {
        PaymentMethod::Transfer => (
            optional_integer(&params, "uint256")?,
            params.get("address").cloned().unwrap_or_default(),
        ),
        PaymentMethod::Direct(_) => (
            optional_integer(&params, "value")?,
            address_part.to_string(),
        ),
    };

    Ok(PaymentIntent {
        recipient_address,
        chain_id,
        method,
        raw_amount,
        display_amount: to_display_amount(raw_amount),
        token_address: address_part.to_string(),
        scheme: scheme.map(str::to_string),
        wallet_id: non_empty_param(&params, "wallet_id"),
        wallet_client: non_empty_param(&params, "wallet_client"),
    })
}

impl FromStr for PaymentIntent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        parse_uri(s)
    }
}

/// Split off a leading `scheme:` when it precedes the target address
fn strip_scheme(input: &str) -> (Option<&str>, &str) {
    let Some((scheme, body)) = input.split_once(':') else {
        return (None, input);
    };

    // A colon after the `@` belongs to something else
    if input.find('@').is_some_and(|at| at < scheme.len()) {
        return (None, input);
    }

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if valid {
        (Some(scheme), body)
    } else {
        (None, input)
    }
}

fn parse_integer(field: &'static str, value: &str) -> Result<u64> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    value.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Absent or empty numeric parameters count as zero
fn optional_integer(params: &HashMap<String, String>, field: &'static str) -> Result<u64> {
    match params.get(field).map(String::as_str) {
        None | Some("") => Ok(0),
        Some(value) => parse_integer(field, value),
    }
}

fn non_empty_param(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params.get(name).filter(|v| !v.is_empty()).cloned()
}

/// Builder for the receive-side QR payload
///
/// Produces the token `transfer` form that [`parse_uri`] reads back.
#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder {
    token_address: String,
    chain_id: u64,
    recipient: Option<String>,
    raw_amount: Option<u64>,
    wallet_id: Option<String>,
    wallet_client: Option<String>,
}

impl PaymentRequestBuilder {
    /// Start a request for a token contract on a chain
    pub fn new(token_address: impl Into<String>, chain_id: u64) -> Self {
        Self {
            token_address: token_address.into(),
            chain_id,
            recipient: None,
            raw_amount: None,
            wallet_id: None,
            wallet_client: None,
        }
    }

    /// Set the account that should receive the funds
    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipient = Some(address.into());
        self
    }

    /// Set the amount in smallest units
    pub fn raw_amount(mut self, raw: u64) -> Self {
        self.raw_amount = Some(raw);
        self
    }

    /// Set the amount from a human-readable string such as `"12.50"`
    pub fn display_amount(mut self, amount: &str) -> Result<Self> {
        self.raw_amount = Some(crate::parse_display_amount(amount)?);
        Ok(self)
    }

    pub fn wallet_id(mut self, id: impl Into<String>) -> Self {
        self.wallet_id = Some(id.into());
        self
    }

    pub fn wallet_client(mut self, client: impl Into<String>) -> Self {
        self.wallet_client = Some(client.into());
        self
    }

    /// Render the URI string
    pub fn build(self) -> Result<String> {
        if self.token_address.is_empty() {
            return Err(ParseError::MissingParameter("token"));
        }
        let recipient = self
            .recipient
            .filter(|r| !r.is_empty())
            .ok_or(ParseError::MissingParameter("address"))?;
        let raw_amount = self.raw_amount.ok_or(ParseError::MissingParameter("uint256"))?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("address", &recipient);
        query.append_pair("uint256", &raw_amount.to_string());
        if let Some(ref id) = self.wallet_id {
            query.append_pair("wallet_id", id);
        }
        if let Some(ref client) = self.wallet_client {
            query.append_pair("wallet_client", client);
        }

        Ok(format!(
            "{}:{}@{}/{}?{}",
            ETHEREUM_SCHEME,
            self.token_address,
            self.chain_id,
            TRANSFER_METHOD,
            query.finish()
        ))
    }
}
