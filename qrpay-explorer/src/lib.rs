//! # Block explorer collaborators for qrpay
//!
//! Implements [`qrpay_wallet::BalanceSource`] and
//! [`qrpay_wallet::TransactionHistory`] on top of an Etherscan-compatible
//! REST API (`module=account`, actions `tokenbalance` and `tokentx`).
//!
//! ```no_run
//! use qrpay_explorer::{ExplorerClient, ExplorerConfig, ExplorerTokenBalance, TokenContract};
//! use qrpay_wallet::{AccountRef, BalanceSource};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ExplorerClient::new(ExplorerConfig::default().with_api_key("KEY"))?;
//! let usdc = ExplorerTokenBalance::new(client, TokenContract::sepolia_usdc());
//! let balance = usdc.get_balance(&AccountRef::new("0x5DFE...")).await?;
//! println!("{}", qrpay_wallet::format_usd(balance));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod sources;

pub use client::{scale_amount, ExplorerClient, TokenTransfer};
pub use config::{
    ExplorerConfig, TokenContract, DEFAULT_API_URL, SEPOLIA_CHAIN_ID, SEPOLIA_USDC,
};
pub use error::{ExplorerError, ExplorerResult};
pub use sources::{ExplorerHistory, ExplorerTokenBalance};
