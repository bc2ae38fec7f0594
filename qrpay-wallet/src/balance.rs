//! Balance aggregation across tokens and networks
//!
//! Each underlying source reports in display units, so the aggregate is a plain
//! sum. Sub-fetches run concurrently and the aggregate fails if any one of them
//! fails: a missing balance is never counted as zero.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{AccountRef, BalanceSource, SourceError};

/// A labelled balance source
#[derive(Clone)]
struct Component {
    label: String,
    source: Arc<dyn BalanceSource>,
}

/// Sums the balances reported by several sources
#[derive(Clone, Default)]
pub struct AggregateBalanceSource {
    components: Vec<Component>,
}

impl AggregateBalanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source, labelled for logs (e.g. `"usdc@8453"`)
    pub fn with_source(
        mut self,
        label: impl Into<String>,
        source: impl BalanceSource + 'static,
    ) -> Self {
        self.components.push(Component {
            label: label.into(),
            source: Arc::new(source),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.label.as_str())
    }
}

#[async_trait]
impl BalanceSource for AggregateBalanceSource {
    async fn get_balance(&self, account: &AccountRef) -> Result<Decimal, SourceError> {
        let fetches = self.components.iter().map(|component| async move {
            match component.source.get_balance(account).await {
                Ok(balance) => {
                    debug!(source = %component.label, %balance, "fetched balance");
                    Ok(balance)
                }
                Err(e) => {
                    warn!(source = %component.label, error = %e, "balance fetch failed");
                    Err(e)
                }
            }
        });

        let balances = try_join_all(fetches).await?;
        Ok(balances.into_iter().sum())
    }
}
