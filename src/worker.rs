//! Swap worker seam
//!
//! Routine swap processing runs outside this crate. The admin processor
//! reaches it through `SwapWorker` to register jobs for pairs added at
//! runtime and to resubmit stuck outgoing transactions. Replacements are
//! signed and broadcast by the sending bridge's submitter; a bridge without
//! one refuses the replacement.

use alloy::primitives::U256;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::metrics;
use crate::store::{StoreError, SwapKey, SwapStore};
use crate::tokens::pairs::parse_amount;
use crate::tokens::{BridgeRegistry, BuildTxArgs, TokenError, TokenPairConfig};
use crate::types::{SwapDirection, SwapStatus};

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("wrong gas price '{0}', must be a positive integer")]
    InvalidGasPrice(String),

    #[error("swap result status is {0}, can not replace")]
    NotReplaceable(SwapStatus),

    #[error("swap result has no swap tx to replace")]
    NoSwapTx,

    #[error("swap tx {swap_tx} is already mined at height {height}")]
    AlreadyMined { swap_tx: String, height: u64 },

    #[error("invalid swap value '{0}'")]
    InvalidValue(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Job registration and transaction replacement
#[async_trait]
pub trait SwapWorker: Send + Sync {
    /// Start processing swaps of a newly added pair
    async fn add_swap_job(&self, pair: &TokenPairConfig) -> Result<(), ReplaceError>;

    /// Resubmit a stuck outgoing transaction with a new gas price
    async fn replace_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        gas_price: &str,
    ) -> Result<(), ReplaceError>;
}

/// In-process worker front: tracks registered pairs and submits replacements
pub struct LocalWorker {
    store: Arc<dyn SwapStore>,
    bridges: Arc<BridgeRegistry>,
    jobs: Mutex<BTreeSet<String>>,
}

impl LocalWorker {
    pub fn new(store: Arc<dyn SwapStore>, bridges: Arc<BridgeRegistry>) -> Self {
        let jobs = bridges.pairs().pair_ids().into_iter().collect();
        Self {
            store,
            bridges,
            jobs: Mutex::new(jobs),
        }
    }

    /// Pair ids with a registered job
    pub fn jobs(&self) -> Vec<String> {
        self.jobs.lock().iter().cloned().collect()
    }
}

fn parse_gas_price(value: &str) -> Result<u128, ReplaceError> {
    parse_amount(value)
        .filter(|price| *price > U256::ZERO)
        .and_then(|price| u128::try_from(price).ok())
        .ok_or_else(|| ReplaceError::InvalidGasPrice(value.to_string()))
}

#[async_trait]
impl SwapWorker for LocalWorker {
    async fn add_swap_job(&self, pair: &TokenPairConfig) -> Result<(), ReplaceError> {
        if self.jobs.lock().insert(pair.pair_id.clone()) {
            info!(pair_id = %pair.pair_id, "Swap job added");
        }
        Ok(())
    }

    async fn replace_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        gas_price: &str,
    ) -> Result<(), ReplaceError> {
        let gas_price = parse_gas_price(gas_price)?;

        let result = self.store.find_swap_result(direction, key).await?;
        if result.status != SwapStatus::MatchTxNotStable {
            return Err(ReplaceError::NotReplaceable(result.status));
        }
        if result.swap_tx.is_empty() {
            return Err(ReplaceError::NoSwapTx);
        }
        if result.swap_height != 0 {
            return Err(ReplaceError::AlreadyMined {
                swap_tx: result.swap_tx,
                height: result.swap_height,
            });
        }
        let origin_value =
            parse_amount(&result.value).ok_or_else(|| ReplaceError::InvalidValue(result.value.clone()))?;

        let args = BuildTxArgs {
            swap_id: key.txid.clone(),
            pair_id: key.pair_id.clone(),
            bind: key.bind.clone(),
            swap_type: result.swap_type,
            origin_value,
            nonce: Some(result.swap_nonce),
            gas_price: Some(gas_price),
        };
        let bridge = self.bridges.sender_for(direction);
        let tx = bridge.build_raw_transaction(&args).await?;
        let tx_hash = bridge.submit_transaction(tx).await?;
        let new_swap_tx = format!("0x{:x}", tx_hash);
        self.store
            .record_replacement(direction, key, &new_swap_tx)
            .await?;

        metrics::record_replacement();
        info!(
            direction = %direction,
            key = %key,
            old_swap_tx = %result.swap_tx,
            new_swap_tx = %new_swap_tx,
            nonce = result.swap_nonce,
            gas_price,
            "Swap tx replaced"
        );
        Ok(())
    }
}
