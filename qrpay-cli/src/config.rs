//! CLI configuration.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use qrpay_explorer::{ExplorerConfig, TokenContract, DEFAULT_API_URL};

/// CLI configuration.
#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Explorer REST endpoint.
    pub explorer_url: String,
    /// Explorer API key.
    pub explorer_api_key: Option<String>,
    /// Account used when `--account` is not given.
    pub account: Option<String>,
    /// Tokens whose balances and transfers are tracked.
    pub tokens: Vec<TokenContract>,
    /// Transfers fetched per token for `history`.
    pub history_page_size: u32,
    /// HTTP timeout in seconds.
    pub http_timeout_secs: u64,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let explorer_url = lookup("QRPAY_EXPLORER_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let explorer_api_key = lookup("QRPAY_EXPLORER_API_KEY").filter(|k| !k.is_empty());
        let account = lookup("QRPAY_ACCOUNT").filter(|a| !a.is_empty());

        let tokens = match lookup("QRPAY_TOKENS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<TokenContract>())
                .collect::<Result<Vec<_>, _>>()
                .context("QRPAY_TOKENS must be a comma list of chainId:contract:decimals")?,
            None => vec![TokenContract::sepolia_usdc()],
        };
        anyhow::ensure!(!tokens.is_empty(), "QRPAY_TOKENS names no tokens");

        let history_page_size: u32 = lookup("QRPAY_HISTORY_PAGE_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let http_timeout_secs: u64 = lookup("QRPAY_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            explorer_url,
            explorer_api_key,
            account,
            tokens,
            history_page_size,
            http_timeout_secs,
        })
    }

    pub fn explorer_config(&self) -> ExplorerConfig {
        let config = ExplorerConfig::default()
            .with_api_url(&self.explorer_url)
            .with_timeout(Duration::from_secs(self.http_timeout_secs))
            .with_page_size(self.history_page_size);
        match &self.explorer_api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    /// `--account` if given, otherwise `QRPAY_ACCOUNT`.
    pub fn resolve_account(&self, flag: Option<String>) -> Result<String> {
        flag.or_else(|| self.account.clone())
            .context("no account: pass --account or set QRPAY_ACCOUNT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.explorer_url, DEFAULT_API_URL);
        assert_eq!(config.explorer_api_key, None);
        assert_eq!(config.account, None);
        assert_eq!(config.tokens, vec![TokenContract::sepolia_usdc()]);
        assert_eq!(config.history_page_size, 10);
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn test_token_list() {
        let config = load(&[(
            "QRPAY_TOKENS",
            "8453:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913:6, 1:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48:6",
        )])
        .unwrap();
        assert_eq!(config.tokens.len(), 2);
        assert_eq!(config.tokens[0].chain_id, 8453);
        assert_eq!(config.tokens[1].chain_id, 1);
    }

    #[test]
    fn test_bad_token_list_is_an_error() {
        assert!(load(&[("QRPAY_TOKENS", "8453:0xA")]).is_err());
        assert!(load(&[("QRPAY_TOKENS", " , ")]).is_err());
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = load(&[
            ("QRPAY_HISTORY_PAGE_SIZE", "many"),
            ("QRPAY_HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.history_page_size, 10);
        assert_eq!(config.http_timeout_secs, 5);
    }

    #[test]
    fn test_account_resolution() {
        let config = load(&[("QRPAY_ACCOUNT", "0xAAA")]).unwrap();
        assert_eq!(config.resolve_account(None).unwrap(), "0xAAA");
        assert_eq!(config.resolve_account(Some("0xBBB".into())).unwrap(), "0xBBB");
        assert!(load(&[]).unwrap().resolve_account(None).is_err());
    }

    #[test]
    fn test_explorer_config() {
        let config = load(&[
            ("QRPAY_EXPLORER_URL", "http://localhost:9000/api"),
            ("QRPAY_EXPLORER_API_KEY", "secret"),
        ])
        .unwrap()
        .explorer_config();
        assert_eq!(config.api_url, "http://localhost:9000/api");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.page_size, 10);
    }
}
