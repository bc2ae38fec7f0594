//! In-memory collaborators
//!
//! Useful for development, demos and tests. Nothing here talks to a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    AccountRef, BalanceSource, SourceError, SubmissionError, SubmissionReceipt,
    TransactionHistory, TransactionRecord, TransferRequest, TransferSubmitter,
};

/// Balances held in a map; unknown accounts have zero balance
#[derive(Debug, Default)]
pub struct MemoryBalanceSource {
    balances: RwLock<HashMap<AccountRef, Decimal>>,
}

impl MemoryBalanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(account: &AccountRef, balance: Decimal) -> Self {
        let source = Self::new();
        source.set_balance(account, balance);
        source
    }

    pub fn set_balance(&self, account: &AccountRef, balance: Decimal) {
        let mut balances = self.balances.write().unwrap_or_else(PoisonError::into_inner);
        balances.insert(account.clone(), balance);
    }
}

#[async_trait]
impl BalanceSource for MemoryBalanceSource {
    async fn get_balance(&self, account: &AccountRef) -> Result<Decimal, SourceError> {
        let balances = self.balances.read().unwrap_or_else(PoisonError::into_inner);
        Ok(balances.get(account).copied().unwrap_or(Decimal::ZERO))
    }
}

/// Balance source that always fails with the configured error
#[derive(Debug, Clone)]
pub struct FailingBalanceSource {
    error: SourceError,
}

impl FailingBalanceSource {
    pub fn new(error: SourceError) -> Self {
        Self { error }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceError::Network(message.into()))
    }
}

#[async_trait]
impl BalanceSource for FailingBalanceSource {
    async fn get_balance(&self, _account: &AccountRef) -> Result<Decimal, SourceError> {
        Err(self.error.clone())
    }
}

/// Records every submitted request and acknowledges it with a synthetic hash
///
/// Queued failures are returned, in order, before any further success.
#[derive(Debug, Default)]
pub struct MemorySubmitter {
    submitted: Mutex<Vec<TransferRequest>>,
    failures: Mutex<VecDeque<SubmissionError>>,
}

impl MemorySubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next submission fail with `error`
    pub fn fail_next(&self, error: SubmissionError) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.push_back(error);
    }

    /// Every request passed to [`TransferSubmitter::submit`], including failed ones
    pub fn submitted(&self) -> Vec<TransferRequest> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl TransferSubmitter for MemorySubmitter {
    async fn submit(&self, request: &TransferRequest) -> Result<SubmissionReceipt, SubmissionError> {
        let count = {
            let mut submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
            submitted.push(request.clone());
            submitted.len()
        };

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(SubmissionReceipt {
            transaction_hash: format!("0x{:064x}", count),
        })
    }
}

/// Fixed transfer history per account
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: RwLock<HashMap<AccountRef, Vec<TransactionRecord>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, account: &AccountRef, record: TransactionRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.entry(account.clone()).or_default().push(record);
    }
}

#[async_trait]
impl TransactionHistory for MemoryHistory {
    async fn list_transactions(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut list = records.get(account).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;
    use chrono::{TimeZone, Utc};

    fn request() -> TransferRequest {
        let intent = qrpay_uri::parse_uri("0xBBB@1/?value=10").unwrap();
        TransferRequest::from_validated(&intent)
    }

    #[tokio::test]
    async fn test_unknown_account_has_zero_balance() {
        let source = MemoryBalanceSource::new();
        let balance = source.get_balance(&AccountRef::new("0xAAA")).await.unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_submitter_failure_queue() {
        let submitter = MemorySubmitter::new();
        submitter.fail_next(SubmissionError::InsufficientGas);

        assert_eq!(
            submitter.submit(&request()).await.unwrap_err(),
            SubmissionError::InsufficientGas
        );
        let receipt = submitter.submit(&request()).await.unwrap();
        assert!(receipt.transaction_hash.starts_with("0x"));
        assert_eq!(receipt.transaction_hash.len(), 66);
        assert_eq!(submitter.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let account = AccountRef::new("0xAAA");
        let history = MemoryHistory::new();
        for (id, ts) in [("1", 100), ("2", 300), ("3", 200)] {
            history.push(
                &account,
                TransactionRecord {
                    id: id.into(),
                    direction: Direction::Incoming,
                    amount: Decimal::ONE,
                    counterparty: "0xBBB".into(),
                    timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
                    hash: format!("0x{}", id),
                },
            );
        }

        let ids: Vec<_> = history
            .list_transactions(&account)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }
}
