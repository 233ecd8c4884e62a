use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SwapStatus, SwapType};

// Note: amounts are kept as decimal strings. Postgres stores them as TEXT so
// 256-bit values survive unchanged; arithmetic happens in the bridge layer.

/// Identity of a swap record: (txid, pair id, bind address)
///
/// All three parts are compared case-insensitively, so the key is
/// normalized to lowercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapKey {
    pub txid: String,
    pub pair_id: String,
    pub bind: String,
}

impl SwapKey {
    pub fn new(txid: &str, pair_id: &str, bind: &str) -> Self {
        Self {
            txid: txid.trim().to_lowercase(),
            pair_id: pair_id.trim().to_lowercase(),
            bind: bind.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for SwapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.txid, self.pair_id, self.bind)
    }
}

/// A registered swap that has not been executed yet (pending shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub key: SwapKey,
    pub tx_to: String,
    pub tx_type: SwapType,
    pub for_native: bool,
    pub for_underlying: bool,
    pub token: String,
    pub path: Vec<String>,
    pub amount_out_min: String,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub log_index: u32,
    pub status: SwapStatus,
    /// Unix seconds of the last status change
    pub timestamp: i64,
    pub memo: String,
}

impl SwapRecord {
    /// A fresh, unverified record for a newly observed source transaction
    pub fn new(key: SwapKey, tx_type: SwapType, timestamp: i64) -> Self {
        Self {
            key,
            tx_to: String::new(),
            tx_type,
            for_native: false,
            for_underlying: false,
            token: String::new(),
            path: Vec::new(),
            amount_out_min: String::new(),
            from_chain_id: String::new(),
            to_chain_id: String::new(),
            log_index: 0,
            status: SwapStatus::TxNotStable,
            timestamp,
            memo: String::new(),
        }
    }
}

/// A swap with its execution outcome (resulted shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResultRecord {
    pub key: SwapKey,
    pub tx_to: String,
    pub tx_height: u64,
    pub tx_time: u64,
    pub from: String,
    pub to: String,
    pub value: String,
    pub for_native: bool,
    pub for_underlying: bool,
    pub token: String,
    pub path: Vec<String>,
    pub amount_out_min: String,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub log_index: u32,
    pub swap_tx: String,
    /// Earlier destination transactions replaced or abandoned by reswap
    pub old_swap_txs: Vec<String>,
    pub swap_height: u64,
    pub swap_time: u64,
    pub swap_value: String,
    pub swap_type: SwapType,
    pub swap_nonce: u64,
    pub status: SwapStatus,
    pub timestamp: i64,
    pub memo: String,
}

impl SwapResultRecord {
    /// Result record for a swap that has been matched but not yet executed
    pub fn from_swap(swap: &SwapRecord, value: &str) -> Self {
        Self {
            key: swap.key.clone(),
            tx_to: swap.tx_to.clone(),
            tx_height: 0,
            tx_time: 0,
            from: String::new(),
            to: String::new(),
            value: value.to_string(),
            for_native: swap.for_native,
            for_underlying: swap.for_underlying,
            token: swap.token.clone(),
            path: swap.path.clone(),
            amount_out_min: swap.amount_out_min.clone(),
            from_chain_id: swap.from_chain_id.clone(),
            to_chain_id: swap.to_chain_id.clone(),
            log_index: swap.log_index,
            swap_tx: String::new(),
            old_swap_txs: Vec::new(),
            swap_height: 0,
            swap_time: 0,
            swap_value: String::new(),
            swap_type: swap.tx_type,
            swap_nonce: 0,
            status: SwapStatus::MatchTxEmpty,
            timestamp: swap.timestamp,
            memo: String::new(),
        }
    }

    /// Drop the execution outcome so the swap can be executed again
    pub fn clear_outcome(&mut self) {
        if !self.swap_tx.is_empty() {
            let previous = std::mem::take(&mut self.swap_tx);
            if !self.old_swap_txs.contains(&previous) {
                self.old_swap_txs.push(previous);
            }
        }
        self.swap_height = 0;
        self.swap_time = 0;
        self.swap_value.clear();
        self.swap_nonce = 0;
        self.status = SwapStatus::MatchTxEmpty;
    }

    /// Record a replacement of the outgoing tx; the previous hash moves to history
    pub fn replace_swap_tx(&mut self, swap_tx: &str) {
        let previous = std::mem::replace(&mut self.swap_tx, swap_tx.to_string());
        if !previous.is_empty() && previous != swap_tx && !self.old_swap_txs.contains(&previous) {
            self.old_swap_txs.push(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_key_is_case_insensitive() {
        let a = SwapKey::new("0xABCDEF", "USDC", "0xBeeF");
        let b = SwapKey::new("0xabcdef", "usdc", "0xbeef");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0xabcdef:usdc:0xbeef");
    }

    #[test]
    fn test_clear_outcome_keeps_old_tx() {
        let swap = SwapRecord::new(SwapKey::new("0x01", "usdc", "0x02"), SwapType::Swapin, 1);
        let mut result = SwapResultRecord::from_swap(&swap, "100");
        result.swap_tx = "0xaaa".to_string();
        result.swap_height = 10;
        result.swap_nonce = 3;
        result.status = SwapStatus::MatchTxFailed;

        result.clear_outcome();
        assert!(result.swap_tx.is_empty());
        assert_eq!(result.swap_height, 0);
        assert_eq!(result.swap_nonce, 0);
        assert_eq!(result.status, SwapStatus::MatchTxEmpty);
        assert_eq!(result.old_swap_txs, vec!["0xaaa".to_string()]);

        // Clearing twice does not duplicate history
        result.clear_outcome();
        assert_eq!(result.old_swap_txs.len(), 1);
    }

    #[test]
    fn test_replace_swap_tx_moves_previous_to_history() {
        let swap = SwapRecord::new(SwapKey::new("0x01", "usdc", "0x02"), SwapType::Swapin, 1);
        let mut result = SwapResultRecord::from_swap(&swap, "100");
        result.swap_tx = "0xaaa".to_string();

        result.replace_swap_tx("0xbbb");
        assert_eq!(result.swap_tx, "0xbbb");
        assert_eq!(result.old_swap_txs, vec!["0xaaa".to_string()]);

        // same hash again leaves history alone
        result.replace_swap_tx("0xbbb");
        assert_eq!(result.old_swap_txs, vec!["0xaaa".to_string()]);
    }
}
