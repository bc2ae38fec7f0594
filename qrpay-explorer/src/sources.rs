//! Wallet collaborators backed by the explorer

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use qrpay_wallet::{
    AccountRef, BalanceSource, Direction, SourceError, TransactionHistory, TransactionRecord,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    scale_amount, ExplorerClient, ExplorerError, ExplorerResult, TokenContract, TokenTransfer,
};

/// Balance of one token on one chain
#[derive(Debug, Clone)]
pub struct ExplorerTokenBalance {
    client: ExplorerClient,
    token: TokenContract,
}

impl ExplorerTokenBalance {
    pub fn new(client: ExplorerClient, token: TokenContract) -> Self {
        Self { client, token }
    }

    pub fn token(&self) -> &TokenContract {
        &self.token
    }
}

#[async_trait]
impl BalanceSource for ExplorerTokenBalance {
    async fn get_balance(&self, account: &AccountRef) -> Result<Decimal, SourceError> {
        let raw = self
            .client
            .token_balance(self.token.chain_id, &self.token.address, account.as_str())
            .await?;
        let balance = scale_amount(raw, self.token.decimals)?;
        debug!(token = %self.token.label(), account = %account, %balance, "token balance");
        Ok(balance)
    }
}

/// Transfers of one token on one chain
#[derive(Debug, Clone)]
pub struct ExplorerHistory {
    client: ExplorerClient,
    token: TokenContract,
}

impl ExplorerHistory {
    pub fn new(client: ExplorerClient, token: TokenContract) -> Self {
        Self { client, token }
    }

    pub fn token(&self) -> &TokenContract {
        &self.token
    }
}

#[async_trait]
impl TransactionHistory for ExplorerHistory {
    async fn list_transactions(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        let transfers = self
            .client
            .token_transfers(self.token.chain_id, &self.token.address, account.as_str())
            .await?;
        debug!(token = %self.token.label(), count = transfers.len(), "token transfers");

        let records = transfers
            .iter()
            .map(|transfer| to_record(transfer, account, self.token.decimals))
            .collect::<ExplorerResult<Vec<_>>>()?;
        Ok(records)
    }
}

fn to_record(
    transfer: &TokenTransfer,
    account: &AccountRef,
    default_decimals: u32,
) -> ExplorerResult<TransactionRecord> {
    let (direction, counterparty) = if account.matches(&transfer.from) {
        (Direction::Outgoing, transfer.to.clone())
    } else {
        (Direction::Incoming, transfer.from.clone())
    };

    let decimals = match transfer.token_decimal.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d
            .parse()
            .map_err(|_| ExplorerError::InvalidResponse(format!("bad tokenDecimal: {}", d)))?,
        _ => default_decimals,
    };
    let raw: u128 = transfer
        .value
        .trim()
        .parse()
        .map_err(|_| ExplorerError::InvalidResponse(format!("bad value: {}", transfer.value)))?;

    let seconds: i64 = transfer.time_stamp.trim().parse().map_err(|_| {
        ExplorerError::InvalidResponse(format!("bad timeStamp: {}", transfer.time_stamp))
    })?;
    let timestamp = Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
        ExplorerError::InvalidResponse(format!("timeStamp out of range: {}", seconds))
    })?;

    // one transaction may carry several transfers of the same token
    let id = match &transfer.log_index {
        Some(index) if !index.is_empty() => format!("{}:{}", transfer.hash, index),
        _ => transfer.hash.clone(),
    };

    Ok(TransactionRecord {
        id,
        direction,
        amount: scale_amount(raw, decimals)?,
        counterparty,
        timestamp,
        hash: transfer.hash.clone(),
    })
}
