//! Swap record store
//!
//! The persistent store is an external collaborator: this module defines
//! the operations the control core needs from it (`SwapStore`) and the
//! status transition rules every implementation must enforce. Two
//! implementations ship with the crate: an in-memory store used by tests
//! and single-process deployments, and a Postgres store.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{SwapDirection, SwapStatus};

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemorySwapStore;
pub use models::*;
pub use postgres::PgSwapStore;

/// Errors reported by a swap store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{direction} swap {key} not found")]
    NotFound { direction: SwapDirection, key: SwapKey },

    #[error("{direction} swap result {key} not found")]
    ResultNotFound { direction: SwapDirection, key: SwapKey },

    #[error("swap status is {status}, can not {action}")]
    InvalidStatus {
        status: SwapStatus,
        action: &'static str,
    },

    #[error("swap result status is {status}, can not {action}")]
    InvalidResultStatus {
        status: SwapStatus,
        action: &'static str,
    },

    #[error("swap tx {swap_tx} was mined at height {height}, can not {action}")]
    SwapTxMined {
        swap_tx: String,
        height: u64,
        action: &'static str,
    },

    #[error("corrupt swap record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Operations the admin processor and status queries require from the store
///
/// Every mutating operation is idempotent: applying it to a record that is
/// already in the target state succeeds without change.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn add_to_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError>;

    async fn remove_from_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError>;

    async fn query_blacklist(&self, address: &str, pair_id: &str) -> Result<bool, StoreError>;

    async fn find_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapRecord, StoreError>;

    async fn find_swap_result(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapResultRecord, StoreError>;

    /// Clear the big-value approval gate so automatic processing resumes
    async fn pass_big_value(&self, direction: SwapDirection, key: &SwapKey)
        -> Result<(), StoreError>;

    /// Clear a recorded verification failure so the swap is verified again
    async fn reverify(&self, direction: SwapDirection, key: &SwapKey) -> Result<(), StoreError>;

    /// Reset a failed execution so the swap is executed again
    async fn reswap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        force: bool,
    ) -> Result<(), StoreError>;

    /// Record the hash of a replacement outgoing transaction
    async fn record_replacement(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        swap_tx: &str,
    ) -> Result<(), StoreError>;

    /// Force a pass/fail status onto a swap, recording the operator memo
    async fn manual_manage_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        memo: &str,
        pass: bool,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// Transition Rules
// ============================================================================

/// Target status of a big-value pass
pub fn big_value_target(current: SwapStatus) -> Result<SwapStatus, StoreError> {
    match current {
        SwapStatus::TxWithBigValue | SwapStatus::TxNotSwapped => Ok(SwapStatus::TxNotSwapped),
        status => Err(StoreError::InvalidStatus {
            status,
            action: "pass big value",
        }),
    }
}

/// Target status of a reverify
pub fn reverify_target(current: SwapStatus) -> Result<SwapStatus, StoreError> {
    if current.can_reverify() || current == SwapStatus::TxNotStable {
        Ok(SwapStatus::TxNotStable)
    } else {
        Err(StoreError::InvalidStatus {
            status: current,
            action: "reverify",
        })
    }
}

/// Target status of a manual pass or fail
///
/// `result` is the swap result record, if one exists. A destination
/// transaction that was already mined blocks both overrides.
pub fn manual_target(
    current: SwapStatus,
    result: Option<&SwapResultRecord>,
    pass: bool,
) -> Result<SwapStatus, StoreError> {
    let action = if pass { "manual make pass" } else { "manual make fail" };
    let allowed = if pass {
        current.can_manual_pass()
    } else {
        current.can_manual_fail()
    };
    if !allowed {
        return Err(StoreError::InvalidStatus {
            status: current,
            action,
        });
    }
    if let Some(result) = result.filter(|r| r.swap_height != 0) {
        return Err(StoreError::SwapTxMined {
            swap_tx: result.swap_tx.clone(),
            height: result.swap_height,
            action,
        });
    }
    Ok(if pass {
        SwapStatus::TxNotSwapped
    } else {
        SwapStatus::ManualMakeFail
    })
}

/// Whether a reswap is allowed; `Ok(false)` means it was already applied
pub fn check_reswap(
    swap: &SwapRecord,
    result: &SwapResultRecord,
    force: bool,
) -> Result<bool, StoreError> {
    if swap.status == SwapStatus::TxNotSwapped && result.status == SwapStatus::MatchTxEmpty {
        return Ok(false);
    }
    if !swap.status.can_reswap() {
        return Err(StoreError::InvalidStatus {
            status: swap.status,
            action: "reswap",
        });
    }
    if !result.status.result_can_reswap() {
        return Err(StoreError::InvalidResultStatus {
            status: result.status,
            action: "reswap",
        });
    }
    if result.swap_height != 0 && !force {
        return Err(StoreError::SwapTxMined {
            swap_tx: result.swap_tx.clone(),
            height: result.swap_height,
            action: "reswap without the force flag",
        });
    }
    Ok(true)
}

/// Current time as unix seconds
pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
