//! In-memory swap store
//!
//! Keeps swap records, results and the blacklist behind a single
//! `parking_lot::RwLock`, so every operation is atomic with respect to the
//! others.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{
    big_value_target, check_reswap, manual_target, now_unix, reverify_target, StoreError,
    SwapKey, SwapRecord, SwapResultRecord, SwapStore,
};
use crate::types::{SwapDirection, SwapStatus};

type RecordKey = (SwapDirection, SwapKey);

#[derive(Default)]
struct Inner {
    swaps: HashMap<RecordKey, SwapRecord>,
    results: HashMap<RecordKey, SwapResultRecord>,
    blacklist: HashSet<(String, String)>,
}

/// Swap store held entirely in process memory
#[derive(Default)]
pub struct MemorySwapStore {
    inner: RwLock<Inner>,
}

fn blacklist_key(address: &str, pair_id: &str) -> (String, String) {
    (address.trim().to_lowercase(), pair_id.trim().to_lowercase())
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a swap record, replacing any existing record with the same key
    pub fn insert_swap(&self, direction: SwapDirection, swap: SwapRecord) {
        let mut inner = self.inner.write();
        inner.swaps.insert((direction, swap.key.clone()), swap);
    }

    /// Register a swap result, replacing any existing result with the same key
    pub fn insert_swap_result(&self, direction: SwapDirection, result: SwapResultRecord) {
        let mut inner = self.inner.write();
        inner.results.insert((direction, result.key.clone()), result);
    }

    /// Update a swap status directly (as the routine processing path would)
    fn set_status(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        target: impl FnOnce(&SwapRecord, Option<&SwapResultRecord>) -> Result<SwapStatus, StoreError>,
        memo: Option<&str>,
    ) -> Result<(), StoreError> {
        let record_key = (direction, key.clone());
        let mut inner = self.inner.write();
        let Inner { swaps, results, .. } = &mut *inner;
        let swap = swaps.get_mut(&record_key).ok_or_else(|| StoreError::NotFound {
            direction,
            key: key.clone(),
        })?;
        let status = target(&*swap, results.get(&record_key))?;
        if swap.status != status {
            debug!(key = %key, from = %swap.status, to = %status, "Swap status updated");
            swap.status = status;
            swap.timestamp = now_unix();
        }
        if let Some(memo) = memo {
            swap.memo = memo.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl SwapStore for MemorySwapStore {
    async fn add_to_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError> {
        self.inner.write().blacklist.insert(blacklist_key(address, pair_id));
        Ok(())
    }

    async fn remove_from_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError> {
        self.inner.write().blacklist.remove(&blacklist_key(address, pair_id));
        Ok(())
    }

    async fn query_blacklist(&self, address: &str, pair_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .blacklist
            .contains(&blacklist_key(address, pair_id)))
    }

    async fn find_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapRecord, StoreError> {
        self.inner
            .read()
            .swaps
            .get(&(direction, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                direction,
                key: key.clone(),
            })
    }

    async fn find_swap_result(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapResultRecord, StoreError> {
        self.inner
            .read()
            .results
            .get(&(direction, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })
    }

    async fn pass_big_value(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<(), StoreError> {
        self.set_status(direction, key, |swap, _| big_value_target(swap.status), None)
    }

    async fn reverify(&self, direction: SwapDirection, key: &SwapKey) -> Result<(), StoreError> {
        self.set_status(direction, key, |swap, _| reverify_target(swap.status), Some(""))
    }

    async fn reswap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        force: bool,
    ) -> Result<(), StoreError> {
        let record_key = (direction, key.clone());
        let mut inner = self.inner.write();
        let Inner { swaps, results, .. } = &mut *inner;

        let swap = swaps.get_mut(&record_key).ok_or_else(|| StoreError::NotFound {
            direction,
            key: key.clone(),
        })?;
        let result = results
            .get_mut(&record_key)
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })?;

        if !check_reswap(swap, result, force)? {
            return Ok(());
        }

        let now = now_unix();
        result.clear_outcome();
        result.timestamp = now;
        swap.status = SwapStatus::TxNotSwapped;
        swap.timestamp = now;
        debug!(key = %key, force, "Swap reset for re-execution");
        Ok(())
    }

    async fn record_replacement(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        swap_tx: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let result = inner
            .results
            .get_mut(&(direction, key.clone()))
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })?;
        result.replace_swap_tx(swap_tx);
        result.timestamp = now_unix();
        debug!(key = %key, swap_tx = %swap_tx, "Replacement swap tx recorded");
        Ok(())
    }

    async fn manual_manage_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        memo: &str,
        pass: bool,
    ) -> Result<(), StoreError> {
        self.set_status(
            direction,
            key,
            |swap, result| manual_target(swap.status, result, pass),
            Some(memo),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SwapType;

    fn store_with(status: SwapStatus) -> (MemorySwapStore, SwapKey) {
        let store = MemorySwapStore::new();
        let key = SwapKey::new("0xaa", "usdc", "0xbb");
        let mut swap = SwapRecord::new(key.clone(), SwapType::Swapin, 1);
        swap.status = status;
        store.insert_swap(SwapDirection::Swapin, swap);
        (store, key)
    }

    #[tokio::test]
    async fn test_blacklist_round_trip() {
        let store = MemorySwapStore::new();
        assert!(!store.query_blacklist("0xAbC", "USDC").await.unwrap());
        store.add_to_blacklist("0xAbC", "USDC").await.unwrap();
        assert!(store.query_blacklist("0xabc", "usdc").await.unwrap());
        store.remove_from_blacklist("0xABC", "usdc").await.unwrap();
        assert!(!store.query_blacklist("0xabc", "usdc").await.unwrap());
    }

    #[tokio::test]
    async fn test_pass_big_value() {
        let (store, key) = store_with(SwapStatus::TxWithBigValue);
        store.pass_big_value(SwapDirection::Swapin, &key).await.unwrap();
        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxNotSwapped);

        // Second run converges on the same state
        store.pass_big_value(SwapDirection::Swapin, &key).await.unwrap();
    }

    #[tokio::test]
    async fn test_direction_is_part_of_the_key() {
        let (store, key) = store_with(SwapStatus::TxWithBigValue);
        let err = store
            .pass_big_value(SwapDirection::Swapout, &key)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_manual_records_memo() {
        let (store, key) = store_with(SwapStatus::TxWithWrongValue);
        store
            .manual_manage_swap(SwapDirection::Swapin, &key, "refunded off-chain", false)
            .await
            .unwrap();
        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::ManualMakeFail);
        assert_eq!(swap.memo, "refunded off-chain");
    }

    #[tokio::test]
    async fn test_manual_pass_refused_after_swap_tx_mined() {
        let (store, key) = store_with(SwapStatus::TxSwapFailed);
        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        let mut result = SwapResultRecord::from_swap(&swap, "1000");
        result.status = SwapStatus::MatchTxFailed;
        result.swap_tx = "0xfeed".to_string();
        result.swap_height = 9;
        store.insert_swap_result(SwapDirection::Swapin, result);

        let err = store
            .manual_manage_swap(SwapDirection::Swapin, &key, "retry", true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidStatus { .. }));

        // same mined result behind a gate status
        store.insert_swap(SwapDirection::Swapin, {
            let mut swap = swap.clone();
            swap.status = SwapStatus::TxWithBigValue;
            swap
        });
        let err = store
            .manual_manage_swap(SwapDirection::Swapin, &key, "retry", true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SwapTxMined { height: 9, .. }));

        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxWithBigValue);
        assert_eq!(swap.memo, "");
        let result = store
            .find_swap_result(SwapDirection::Swapin, &key)
            .await
            .unwrap();
        assert_eq!(result.swap_tx, "0xfeed");
    }

    #[tokio::test]
    async fn test_reswap_resets_result() {
        let (store, key) = store_with(SwapStatus::TxSwapFailed);
        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        let mut result = SwapResultRecord::from_swap(&swap, "1000");
        result.status = SwapStatus::MatchTxFailed;
        result.swap_tx = "0xfeed".to_string();
        store.insert_swap_result(SwapDirection::Swapin, result);

        store.reswap(SwapDirection::Swapin, &key, false).await.unwrap();

        let swap = store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        let result = store
            .find_swap_result(SwapDirection::Swapin, &key)
            .await
            .unwrap();
        assert_eq!(swap.status, SwapStatus::TxNotSwapped);
        assert_eq!(result.status, SwapStatus::MatchTxEmpty);
        assert_eq!(result.old_swap_txs, vec!["0xfeed".to_string()]);

        // Re-running is a no-op
        store.reswap(SwapDirection::Swapin, &key, false).await.unwrap();
    }
}
