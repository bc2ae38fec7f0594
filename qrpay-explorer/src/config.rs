//! Explorer endpoint and token configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ExplorerError;

/// Etherscan v2 multichain endpoint
pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Sepolia chain id
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Circle USDC on Sepolia
pub const SEPOLIA_USDC: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";

/// Explorer connection settings
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub api_url: String,
    /// Sent as `apikey` when set
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Transfers fetched per history request
    pub page_size: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            page_size: 10,
        }
    }
}

impl ExplorerConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// An ERC-20 token deployment on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContract {
    pub chain_id: u64,
    pub address: String,
    pub decimals: u32,
}

impl TokenContract {
    pub fn new(chain_id: u64, address: impl Into<String>, decimals: u32) -> Self {
        Self {
            chain_id,
            address: address.into(),
            decimals,
        }
    }

    pub fn sepolia_usdc() -> Self {
        Self::new(SEPOLIA_CHAIN_ID, SEPOLIA_USDC, 6)
    }

    /// Label used in logs, e.g. `0x1c7D...7238@11155111`
    pub fn label(&self) -> String {
        format!("{}@{}", qrpay_wallet::mask_address(&self.address), self.chain_id)
    }
}

impl fmt::Display for TokenContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain_id, self.address, self.decimals)
    }
}

/// Parses `chainId:contract:decimals`
impl FromStr for TokenContract {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExplorerError::InvalidToken(s.to_string());

        let mut parts = s.trim().split(':');
        let (Some(chain_id), Some(address), Some(decimals), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let chain_id = chain_id.trim().parse().map_err(|_| invalid())?;
        let address = address.trim();
        if address.is_empty() {
            return Err(invalid());
        }
        // rust_decimal supports at most 28 fractional digits
        let decimals: u32 = decimals.trim().parse().map_err(|_| invalid())?;
        if decimals > 28 {
            return Err(invalid());
        }

        Ok(Self::new(chain_id, address, decimals))
    }
}
