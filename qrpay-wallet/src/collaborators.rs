//! Boundaries to the services this crate orchestrates but does not implement

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    AccountRef, SourceError, SubmissionError, SubmissionReceipt, TransactionRecord,
    TransferRequest,
};

/// Source of an account's spendable balance, in display units
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn get_balance(&self, account: &AccountRef) -> Result<Decimal, SourceError>;
}

/// Wallet or account-abstraction service that signs and broadcasts transfers
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    async fn submit(&self, request: &TransferRequest) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Read-only view of an account's transfers; pagination is the implementor's concern
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn list_transactions(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<TransactionRecord>, SourceError>;
}

#[async_trait]
impl<T: BalanceSource + ?Sized> BalanceSource for Arc<T> {
    async fn get_balance(&self, account: &AccountRef) -> Result<Decimal, SourceError> {
        (**self).get_balance(account).await
    }
}

#[async_trait]
impl<T: TransferSubmitter + ?Sized> TransferSubmitter for Arc<T> {
    async fn submit(&self, request: &TransferRequest) -> Result<SubmissionReceipt, SubmissionError> {
        (**self).submit(request).await
    }
}

#[async_trait]
impl<T: TransactionHistory + ?Sized> TransactionHistory for Arc<T> {
    async fn list_transactions(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        (**self).list_transactions(account).await
    }
}
