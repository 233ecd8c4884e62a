//! Swap status projection
//!
//! Turns stored swap records into the outward `SwapInfo` view. Pending
//! records carry no execution outcome; resulted records carry the outcome
//! plus a confirmation count derived from the latest height of the chain the
//! outgoing transaction landed on.
//!
//! Swap-in and swap-out read the heights cached by the height watcher.
//! Router swaps query the destination chain live, by chain id.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::store::{SwapRecord, SwapResultRecord};
use crate::tokens::TokenError;
use crate::types::{SwapStatus, SwapType};

/// Latest observed heights, as needed by the projection
#[async_trait]
pub trait HeightSource: Send + Sync {
    /// Height cached for the chain a swap type settles on
    fn cached_height(&self, swap_type: SwapType) -> u64;

    /// Height read from the chain with the given id
    async fn live_height(&self, chain_id: &str) -> Result<u64, TokenError>;
}

/// Outward view of a swap
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    #[serde(rename = "pairID")]
    pub pair_id: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub tx_to: String,
    pub bind: String,
    pub for_native: bool,
    pub for_underlying: bool,
    pub token: String,
    pub path: Vec<String>,
    pub amount_out_min: String,
    #[serde(rename = "fromChainID")]
    pub from_chain_id: String,
    #[serde(rename = "toChainID")]
    pub to_chain_id: String,
    pub log_index: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    // Execution outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_swap_txs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_type: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_nonce: Option<u64>,

    #[serde(serialize_with = "status_code")]
    pub status: SwapStatus,
    pub status_msg: String,
    pub timestamp: i64,
    pub memo: String,
    pub confirmations: u64,
}

fn status_code<S: serde::Serializer>(status: &SwapStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i32(i32::from(*status))
}

impl SwapInfo {
    /// Whether any execution outcome field is set
    pub fn has_outcome(&self) -> bool {
        self.swap_tx.is_some()
            || self.swap_height.is_some()
            || self.swap_time.is_some()
            || self.swap_value.is_some()
            || self.swap_type.is_some()
            || self.swap_nonce.is_some()
    }
}

/// Project a pending swap record
pub fn convert_swap(swap: &SwapRecord) -> SwapInfo {
    SwapInfo {
        pair_id: swap.key.pair_id.clone(),
        tx_id: swap.key.txid.clone(),
        tx_to: swap.tx_to.clone(),
        bind: swap.key.bind.clone(),
        for_native: swap.for_native,
        for_underlying: swap.for_underlying,
        token: swap.token.clone(),
        path: swap.path.clone(),
        amount_out_min: swap.amount_out_min.clone(),
        from_chain_id: swap.from_chain_id.clone(),
        to_chain_id: swap.to_chain_id.clone(),
        log_index: swap.log_index,
        tx_height: None,
        tx_time: None,
        from: None,
        to: None,
        value: None,
        swap_tx: None,
        old_swap_txs: None,
        swap_height: None,
        swap_time: None,
        swap_value: None,
        swap_type: None,
        swap_nonce: None,
        status: swap.status,
        status_msg: swap.status.as_str().to_string(),
        timestamp: swap.timestamp,
        memo: swap.memo.clone(),
        confirmations: 0,
    }
}

/// Project pending swap records, preserving order
pub fn convert_swaps(swaps: &[SwapRecord]) -> Vec<SwapInfo> {
    swaps.iter().map(convert_swap).collect()
}

/// Blocks elapsed on the settling chain since the swap was executed
pub async fn confirmations(result: &SwapResultRecord, heights: &dyn HeightSource) -> u64 {
    if result.swap_height == 0 {
        return 0;
    }
    let latest = match result.swap_type {
        SwapType::RouterSwap => match heights.live_height(&result.to_chain_id).await {
            Ok(height) => height,
            Err(e) => {
                debug!(
                    to_chain_id = %result.to_chain_id,
                    error = %e,
                    "Latest height unavailable, reporting zero confirmations"
                );
                0
            }
        },
        swap_type => heights.cached_height(swap_type),
    };
    latest.saturating_sub(result.swap_height)
}

/// Project a resulted swap record
pub async fn convert_swap_result(
    result: &SwapResultRecord,
    heights: &dyn HeightSource,
) -> SwapInfo {
    let confirmations = confirmations(result, heights).await;
    SwapInfo {
        pair_id: result.key.pair_id.clone(),
        tx_id: result.key.txid.clone(),
        tx_to: result.tx_to.clone(),
        bind: result.key.bind.clone(),
        for_native: result.for_native,
        for_underlying: result.for_underlying,
        token: result.token.clone(),
        path: result.path.clone(),
        amount_out_min: result.amount_out_min.clone(),
        from_chain_id: result.from_chain_id.clone(),
        to_chain_id: result.to_chain_id.clone(),
        log_index: result.log_index,
        tx_height: Some(result.tx_height),
        tx_time: Some(result.tx_time),
        from: Some(result.from.clone()),
        to: Some(result.to.clone()),
        value: Some(result.value.clone()),
        swap_tx: Some(result.swap_tx.clone()),
        old_swap_txs: Some(result.old_swap_txs.clone()),
        swap_height: Some(result.swap_height),
        swap_time: Some(result.swap_time),
        swap_value: Some(result.swap_value.clone()),
        swap_type: Some(result.swap_type as u32),
        swap_nonce: Some(result.swap_nonce),
        status: result.status,
        status_msg: result.status.as_str().to_string(),
        timestamp: result.timestamp,
        memo: result.memo.clone(),
        confirmations,
    }
}

/// Project resulted swap records, preserving order
pub async fn convert_swap_results(
    results: &[SwapResultRecord],
    heights: &dyn HeightSource,
) -> Vec<SwapInfo> {
    let mut infos = Vec::with_capacity(results.len());
    for result in results {
        infos.push(convert_swap_result(result, heights).await);
    }
    infos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SwapKey;

    struct FixedHeights {
        src: u64,
        dst: u64,
        router: Option<u64>,
    }

    #[async_trait]
    impl HeightSource for FixedHeights {
        fn cached_height(&self, swap_type: SwapType) -> u64 {
            match swap_type {
                SwapType::Swapin => self.dst,
                SwapType::Swapout => self.src,
                SwapType::RouterSwap => 0,
            }
        }

        async fn live_height(&self, chain_id: &str) -> Result<u64, TokenError> {
            self.router
                .ok_or_else(|| TokenError::UnknownChainId(chain_id.to_string()))
        }
    }

    const HEIGHTS: FixedHeights = FixedHeights {
        src: 1000,
        dst: 200,
        router: Some(5000),
    };

    fn result(swap_type: SwapType, swap_height: u64) -> SwapResultRecord {
        let swap = SwapRecord::new(SwapKey::new("0xabc", "usdt", "0xdef"), swap_type, 10);
        let mut result = SwapResultRecord::from_swap(&swap, "100");
        result.swap_height = swap_height;
        result.to_chain_id = "56".to_string();
        result.status = SwapStatus::MatchTxNotStable;
        result
    }

    #[test]
    fn test_pending_has_no_outcome() {
        for status in SwapStatus::ALL {
            let mut swap = SwapRecord::new(SwapKey::new("0x1", "p", "0x2"), SwapType::Swapin, 1);
            swap.status = status;
            let info = convert_swap(&swap);
            assert_eq!(info.confirmations, 0);
            assert!(!info.has_outcome());
            assert_eq!(info.status_msg, status.as_str());
        }
    }

    #[tokio::test]
    async fn test_unexecuted_result_has_zero_confirmations() {
        let info = convert_swap_result(&result(SwapType::Swapin, 0), &HEIGHTS).await;
        assert_eq!(info.confirmations, 0);
        assert!(info.has_outcome());
    }

    #[tokio::test]
    async fn test_confirmations_by_swap_type() {
        // swap-in settles on the destination chain, swap-out on the source
        assert_eq!(confirmations(&result(SwapType::Swapin, 150), &HEIGHTS).await, 50);
        assert_eq!(confirmations(&result(SwapType::Swapout, 990), &HEIGHTS).await, 10);
        assert_eq!(confirmations(&result(SwapType::RouterSwap, 4000), &HEIGHTS).await, 1000);
    }

    #[tokio::test]
    async fn test_confirmations_never_negative() {
        assert_eq!(confirmations(&result(SwapType::Swapin, 500), &HEIGHTS).await, 0);
        assert_eq!(confirmations(&result(SwapType::Swapin, 200), &HEIGHTS).await, 0);
    }

    #[tokio::test]
    async fn test_router_lookup_failure_is_zero() {
        let heights = FixedHeights {
            router: None,
            ..HEIGHTS
        };
        assert_eq!(confirmations(&result(SwapType::RouterSwap, 10), &heights).await, 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let records = vec![
            result(SwapType::Swapin, 100),
            result(SwapType::Swapout, 0),
            result(SwapType::Swapin, 199),
        ];
        let infos = convert_swap_results(&records, &HEIGHTS).await;
        let confs: Vec<u64> = infos.iter().map(|i| i.confirmations).collect();
        assert_eq!(confs, vec![100, 0, 1]);
        assert!(convert_swaps(&[]).is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let swap = SwapRecord::new(SwapKey::new("0x1", "usdt", "0x2"), SwapType::Swapin, 1);
        let json = serde_json::to_value(convert_swap(&swap)).unwrap();
        assert_eq!(json["pairID"], "usdt");
        assert_eq!(json["txID"], "0x1");
        assert_eq!(json["status"], 0);
        assert_eq!(json["statusMsg"], "TxNotStable");
        assert!(json.get("swapTx").is_none());
    }
}
