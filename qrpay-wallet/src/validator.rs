//! Balance validation for payment intents
//!
//! The published [`ValidationResult`] flips to "checking" the moment
//! [`BalanceValidator::validate`] is called, before the returned future is
//! polled, so a confirmation screen can render the pending state immediately.
//! A drop guard clears the flag on every exit path, including when the future
//! is dropped mid-fetch. Every check carries a generation number; a guard or
//! result from an older check never touches the state of a newer one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{AccountRef, BalanceSource, ValidationError};

/// Message shown when the account cannot cover the transfer
pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "Insufficient balance";

/// Outcome of a balance check, as rendered by the confirmation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// A check is in flight
    pub is_checking: bool,
    /// `None` until a check resolves, and after a failed check
    pub sufficient_funds: Option<bool>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    /// No check has run
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn checking() -> Self {
        Self {
            is_checking: true,
            ..Self::default()
        }
    }

    pub fn sufficient() -> Self {
        Self {
            sufficient_funds: Some(true),
            ..Self::default()
        }
    }

    pub fn insufficient() -> Self {
        Self::rejected(INSUFFICIENT_BALANCE_MESSAGE)
    }

    /// The transfer cannot proceed for a reason other than a failed lookup
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            is_checking: false,
            sufficient_funds: Some(false),
            error_message: Some(message.into()),
        }
    }

    /// The lookup itself failed; funds are unknown
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_checking: false,
            sufficient_funds: None,
            error_message: Some(message.into()),
        }
    }

    /// Whether a confirm action may go ahead
    pub fn can_proceed(&self) -> bool {
        !self.is_checking && self.sufficient_funds == Some(true)
    }
}

/// Checks required amounts against an account's available balance
pub struct BalanceValidator<B> {
    source: B,
    state: watch::Sender<ValidationResult>,
    generation: AtomicU64,
}

impl<B: BalanceSource> BalanceValidator<B> {
    pub fn new(source: B) -> Self {
        let (state, _) = watch::channel(ValidationResult::idle());
        Self {
            source,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &B {
        &self.source
    }

    /// Latest published result
    pub fn result(&self) -> ValidationResult {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ValidationResult> {
        self.state.subscribe()
    }

    /// Forget the current result; any check still in flight becomes stale
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = ValidationResult::idle();
        });
    }

    /// Check whether `account` can cover `required` display units
    ///
    /// Insufficient funds resolves to `Ok` with `sufficient_funds == Some(false)`.
    /// `Err` means the balance source could not be reached; nothing is retried.
    pub fn validate<'a>(
        &'a self,
        required: Decimal,
        account: &'a AccountRef,
    ) -> impl Future<Output = Result<ValidationResult, ValidationError>> + Send + 'a {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ValidationResult::checking();
        });
        let guard = CheckGuard {
            state: &self.state,
            current: &self.generation,
            generation,
        };

        async move {
            let outcome = self.check(required, account).await;
            match &outcome {
                Ok(result) => guard.publish(result.clone()),
                Err(e) => {
                    warn!(account = %account, error = %e, "balance check failed");
                    guard.publish(ValidationResult::failed(e.to_string()));
                }
            }
            outcome
        }
    }

    async fn check(
        &self,
        required: Decimal,
        account: &AccountRef,
    ) -> Result<ValidationResult, ValidationError> {
        if required.is_sign_negative() && !required.is_zero() {
            return Ok(ValidationResult::rejected("Amount must not be negative"));
        }
        if required.is_zero() {
            return Ok(ValidationResult::sufficient());
        }

        let available = self.source.get_balance(account).await?;
        debug!(account = %account, %available, %required, "balance fetched");

        if available >= required {
            Ok(ValidationResult::sufficient())
        } else {
            Ok(ValidationResult::insufficient())
        }
    }
}

/// Clears the checking flag for one generation when dropped
struct CheckGuard<'a> {
    state: &'a watch::Sender<ValidationResult>,
    current: &'a AtomicU64,
    generation: u64,
}

impl CheckGuard<'_> {
    fn publish(&self, result: ValidationResult) {
        let generation = self.generation;
        let current = self.current;
        let applied = self.state.send_if_modified(|state| {
            if current.load(Ordering::SeqCst) == generation {
                *state = result;
                true
            } else {
                false
            }
        });
        if !applied {
            debug!(generation, "discarding stale balance check");
        }
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        let current = self.current;
        self.state.send_if_modified(|state| {
            if current.load(Ordering::SeqCst) == generation && state.is_checking {
                state.is_checking = false;
                true
            } else {
                false
            }
        });
    }
}
