//! Payment asset and reward token collaborators.
//!
//! The registry only depends on the traits here; the in-memory
//! implementations back the service and the tests.

use crate::domain::{Address, Amount, MathError};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub mod asset;
pub mod reward;

pub use asset::{InMemoryAsset, PaymentAsset, PaymentHold};
pub use reward::{InMemoryRewardToken, RewardToken};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance for {owner}: need {needed}, have {available}")]
    InsufficientBalance {
        owner: Address,
        needed: Amount,
        available: Amount,
    },
    #[error("insufficient allowance for {owner}: need {needed}, have {available}")]
    InsufficientAllowance {
        owner: Address,
        needed: Amount,
        available: Amount,
    },
    #[error("{caller} is not the authorized minter")]
    NotMinter { caller: Address },
    #[error("transfer rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Lock a ledger mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
