//! Etherscan-style REST client
//!
//! All calls are `GET <api_url>?chainid=..&module=account&action=..`. The API
//! wraps every answer in `{ "status", "message", "result" }`; `status == "1"`
//! means success and `result` holds the payload, otherwise `result` is a
//! human-readable reason.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{ExplorerConfig, ExplorerError, ExplorerResult};

/// Message the API uses for an account without matching transfers
const NO_TRANSACTIONS: &str = "No transactions found";

/// Response envelope shared by all `module=account` actions
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    #[serde(default)]
    result: Value,
}

/// One row of `action=tokentx`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub block_number: String,
    /// Unix seconds, as a decimal string
    pub time_stamp: String,
    pub hash: String,
    #[serde(default)]
    pub log_index: Option<String>,
    pub from: String,
    pub to: String,
    /// Smallest units, as a decimal string
    pub value: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub token_decimal: Option<String>,
}

/// Thin client over the explorer's account endpoints
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    config: ExplorerConfig,
    http: Client,
}

impl ExplorerClient {
    pub fn new(config: ExplorerConfig) -> ExplorerResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Raw ERC-20 balance of `account`, in the token's smallest units
    pub async fn token_balance(
        &self,
        chain_id: u64,
        contract: &str,
        account: &str,
    ) -> ExplorerResult<u128> {
        let result = self
            .call(
                chain_id,
                "tokenbalance",
                &[
                    ("contractaddress", contract.to_string()),
                    ("address", account.to_string()),
                    ("tag", "latest".to_string()),
                ],
            )
            .await?
            .ok_or_else(|| ExplorerError::InvalidResponse("empty token balance".into()))?;

        let raw = match &result {
            Value::String(s) => s.as_str(),
            other => {
                return Err(ExplorerError::InvalidResponse(format!(
                    "token balance is not a string: {}",
                    other
                )))
            }
        };
        raw.trim().parse().map_err(|_| {
            ExplorerError::InvalidResponse(format!("token balance is not an integer: {}", raw))
        })
    }

    /// Most recent ERC-20 transfers touching `account`, newest first
    pub async fn token_transfers(
        &self,
        chain_id: u64,
        contract: &str,
        account: &str,
    ) -> ExplorerResult<Vec<TokenTransfer>> {
        let result = self
            .call(
                chain_id,
                "tokentx",
                &[
                    ("contractaddress", contract.to_string()),
                    ("address", account.to_string()),
                    ("page", "1".to_string()),
                    ("offset", self.config.page_size.to_string()),
                    ("sort", "desc".to_string()),
                ],
            )
            .await?;

        match result {
            None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Issue one request; `Ok(None)` when the API reports no transactions
    async fn call(
        &self,
        chain_id: u64,
        action: &str,
        params: &[(&'static str, String)],
    ) -> ExplorerResult<Option<Value>> {
        let mut query: Vec<(&str, String)> = vec![
            ("chainid", chain_id.to_string()),
            ("module", "account".to_string()),
            ("action", action.to_string()),
        ];
        query.extend(params.iter().cloned());

        debug!(chain_id, action, url = %self.config.api_url, "explorer request");

        if let Some(key) = &self.config.api_key {
            query.push(("apikey", key.clone()));
        }

        let body = self
            .http
            .get(&self.config.api_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let envelope: Envelope = serde_json::from_str(&body)?;

        if envelope.status == "1" {
            return Ok(Some(envelope.result));
        }
        if envelope.message.starts_with(NO_TRANSACTIONS) {
            return Ok(None);
        }

        let detail = match envelope.result {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Err(ExplorerError::Api {
            message: envelope.message,
            detail,
        })
    }
}

/// Convert smallest units to display units
pub fn scale_amount(raw: u128, decimals: u32) -> ExplorerResult<Decimal> {
    let raw = i128::try_from(raw)
        .map_err(|_| ExplorerError::InvalidResponse(format!("amount out of range: {}", raw)))?;
    Decimal::try_from_i128_with_scale(raw, decimals)
        .map(|d| d.normalize())
        .map_err(|e| ExplorerError::InvalidResponse(format!("amount out of range: {}", e)))
}
