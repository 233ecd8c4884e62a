//! Token pair configuration
//!
//! Pairs are loaded from TOML files (one pair per file) at startup and at
//! runtime through the `addpair` admin command. The per-direction
//! `disable_swap` flags are atomics: the routine processing path reads them
//! without locking while `maintain` flips them.

use alloy::primitives::U256;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or registering a pair configuration
#[derive(Error, Debug)]
pub enum PairConfigError {
    #[error("load pair config file '{path}' failed: {source}")]
    Load {
        path: String,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("pair id '{0}' already exist")]
    Duplicate(String),

    #[error("invalid pair config '{pair_id}': {reason}")]
    Invalid { pair_id: String, reason: String },
}

/// Parse a decimal or `0x` prefixed amount
pub fn parse_amount(s: &str) -> Option<U256> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_str_radix(s, 10).ok()
    }
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_amount(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid amount '{}'", raw)))
}

/// One side of a token pair
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Token contract; empty for a native coin
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub deposit_address: String,
    /// Releases go through `contract_address` holding `delegate_token`
    #[serde(default)]
    pub is_delegate_contract: bool,
    #[serde(default)]
    pub delegate_token: String,
    #[serde(default)]
    pub swap_fee_bps: u32,
    #[serde(default, deserialize_with = "de_amount")]
    pub min_swap_fee: U256,
    #[serde(default, deserialize_with = "de_amount")]
    pub max_swap_fee: U256,
    #[serde(default, deserialize_with = "de_amount")]
    pub minimum_swap: U256,
    #[serde(default, deserialize_with = "de_amount")]
    pub maximum_swap: U256,
    #[serde(default, deserialize_with = "de_amount")]
    pub big_value_threshold: U256,
    /// Initial state of the swap switch for this side
    #[serde(default)]
    pub disable_swap: bool,
}

impl TokenConfig {
    pub fn is_native(&self) -> bool {
        self.contract_address.is_empty()
    }

    fn validate(&self, pair_id: &str, side: &str) -> Result<(), PairConfigError> {
        let invalid = |reason: String| PairConfigError::Invalid {
            pair_id: pair_id.to_string(),
            reason,
        };
        if self.symbol.is_empty() {
            return Err(invalid(format!("{} token has empty symbol", side)));
        }
        if self.swap_fee_bps > 10_000 {
            return Err(invalid(format!(
                "{} token swap_fee_bps {} exceeds 10000",
                side, self.swap_fee_bps
            )));
        }
        if !self.max_swap_fee.is_zero() && self.min_swap_fee > self.max_swap_fee {
            return Err(invalid(format!("{} token min_swap_fee > max_swap_fee", side)));
        }
        if !self.maximum_swap.is_zero() && self.minimum_swap > self.maximum_swap {
            return Err(invalid(format!("{} token minimum_swap > maximum_swap", side)));
        }
        if self.is_delegate_contract && (self.contract_address.is_empty() || self.delegate_token.is_empty()) {
            return Err(invalid(format!(
                "{} token is a delegate contract without contract_address or delegate_token",
                side
            )));
        }
        Ok(())
    }
}

/// A token pair as read from its configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPairConfig {
    pub pair_id: String,
    pub src_token: TokenConfig,
    pub dest_token: TokenConfig,
}

impl TokenPairConfig {
    /// Load a pair configuration file (TOML)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PairConfigError> {
        let path = path.as_ref();
        let load_err = |source| PairConfigError::Load {
            path: path.display().to_string(),
            source,
        };
        let mut pair: TokenPairConfig = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .map_err(load_err)?
            .try_deserialize()
            .map_err(load_err)?;
        pair.pair_id = pair.pair_id.trim().to_lowercase();
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<(), PairConfigError> {
        if self.pair_id.is_empty() {
            return Err(PairConfigError::Invalid {
                pair_id: String::new(),
                reason: "empty pair_id".to_string(),
            });
        }
        self.src_token.validate(&self.pair_id, "src")?;
        self.dest_token.validate(&self.pair_id, "dest")
    }
}

/// Registered pair with its live swap switches
#[derive(Debug)]
pub struct PairEntry {
    config: TokenPairConfig,
    src_disabled: AtomicBool,
    dest_disabled: AtomicBool,
}

impl PairEntry {
    fn new(config: TokenPairConfig) -> Self {
        Self {
            src_disabled: AtomicBool::new(config.src_token.disable_swap),
            dest_disabled: AtomicBool::new(config.dest_token.disable_swap),
            config,
        }
    }

    pub fn config(&self) -> &TokenPairConfig {
        &self.config
    }

    pub fn pair_id(&self) -> &str {
        &self.config.pair_id
    }

    /// Token config of the source (`is_src`) or destination side
    pub fn token(&self, is_src: bool) -> &TokenConfig {
        if is_src {
            &self.config.src_token
        } else {
            &self.config.dest_token
        }
    }

    /// Deposit (swap-in) switch
    pub fn src_disabled(&self) -> bool {
        self.src_disabled.load(Ordering::Acquire)
    }

    /// Withdraw (swap-out) switch
    pub fn dest_disabled(&self) -> bool {
        self.dest_disabled.load(Ordering::Acquire)
    }

    pub fn set_src_disabled(&self, disabled: bool) {
        self.src_disabled.store(disabled, Ordering::Release);
    }

    pub fn set_dest_disabled(&self, disabled: bool) {
        self.dest_disabled.store(disabled, Ordering::Release);
    }
}

/// All configured token pairs, keyed by lowercase pair id
#[derive(Debug, Default)]
pub struct TokenPairRegistry {
    pairs: RwLock<BTreeMap<String, Arc<PairEntry>>>,
}

impl TokenPairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already parsed pair
    pub fn add_pair(&self, pair: TokenPairConfig) -> Result<Arc<PairEntry>, PairConfigError> {
        pair.validate()?;
        let pair_id = pair.pair_id.trim().to_lowercase();
        let mut pairs = self.pairs.write();
        if pairs.contains_key(&pair_id) {
            return Err(PairConfigError::Duplicate(pair_id));
        }
        let entry = Arc::new(PairEntry::new(pair));
        pairs.insert(pair_id.clone(), entry.clone());
        info!(pair_id = %pair_id, "Token pair registered");
        Ok(entry)
    }

    /// Parse, validate and register a pair configuration file
    pub fn add_pair_config_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<TokenPairConfig, PairConfigError> {
        let pair = TokenPairConfig::load(path)?;
        self.add_pair(pair.clone())?;
        Ok(pair)
    }

    /// Load every `*.toml` file of a directory
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> eyre::Result<usize> {
        use eyre::WrapErr;

        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .wrap_err_with(|| format!("Failed to read pairs dir {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "toml").unwrap_or(false))
            .collect();
        paths.sort();
        for path in &paths {
            self.add_pair_config_file(path)?;
        }
        Ok(paths.len())
    }

    /// Unregister a pair, returning its entry if it was present
    pub fn remove_pair(&self, pair_id: &str) -> Option<Arc<PairEntry>> {
        let removed = self.pairs.write().remove(&pair_id.trim().to_lowercase());
        if removed.is_some() {
            info!(pair_id = %pair_id, "Token pair unregistered");
        }
        removed
    }

    pub fn get(&self, pair_id: &str) -> Option<Arc<PairEntry>> {
        self.pairs.read().get(&pair_id.trim().to_lowercase()).cloned()
    }

    pub fn pair_ids(&self) -> Vec<String> {
        self.pairs.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.read().is_empty()
    }
}

// ============================================================================
// Value Conversion
// ============================================================================

/// Fee charged on a swap of `value` with the given token settings
pub fn calc_swap_fee(token: &TokenConfig, value: U256) -> U256 {
    if token.swap_fee_bps == 0 {
        return U256::ZERO;
    }
    let mut fee = value.saturating_mul(U256::from(token.swap_fee_bps)) / U256::from(10_000u32);
    if fee < token.min_swap_fee {
        fee = token.min_swap_fee;
    }
    if !token.max_swap_fee.is_zero() && fee > token.max_swap_fee {
        fee = token.max_swap_fee;
    }
    fee
}

/// Convert between token decimals
pub fn convert_decimals(value: U256, from: u8, to: u8) -> U256 {
    match from.cmp(&to) {
        std::cmp::Ordering::Equal => value,
        std::cmp::Ordering::Less => {
            value.saturating_mul(U256::from(10u8).pow(U256::from(to - from)))
        }
        std::cmp::Ordering::Greater => value / U256::from(10u8).pow(U256::from(from - to)),
    }
}

/// Amount released on the other chain for an observed `value`
///
/// The fee is charged in the token the value was observed in (source token
/// for swap-in, destination token for swap-out), then the remainder is
/// converted to the receiving token's decimals.
pub fn calc_swapped_value(pair: &TokenPairConfig, value: U256, is_swapin: bool) -> U256 {
    let (from, to) = if is_swapin {
        (&pair.src_token, &pair.dest_token)
    } else {
        (&pair.dest_token, &pair.src_token)
    };
    let fee = calc_swap_fee(from, value);
    let remaining = value.saturating_sub(fee);
    convert_decimals(remaining, from.decimals, to.decimals)
}
