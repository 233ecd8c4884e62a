//! Chain bridges
//!
//! One `Bridge` per connected chain. The two chain families share a
//! `BridgeCommon` (chain config, endpoint role, token pairs, cached latest
//! height) and differ in the capabilities they offer:
//!
//! | Capability               | Eth | Utxo            |
//! |--------------------------|-----|-----------------|
//! | build swap transaction   | yes | no              |
//! | nonce override           | yes | no              |
//! | address conversion       | no  | yes             |
//! | sign and broadcast       | yes | no              |
//! | live block number        | RPC | RPC, else cache |

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{ChainConfig, ChainFamily, Config};
use crate::swapapi::HeightSource;
use crate::types::{SwapDirection, SwapType};

pub mod eth;
pub mod pairs;
pub mod utxo;
pub mod watcher;

pub use eth::{ChainReader, EthBridge, RpcEvmReader, RpcTxSubmitter, TxSubmitter};
pub use pairs::{
    calc_swapped_value, PairConfigError, PairEntry, TokenConfig, TokenPairConfig,
    TokenPairRegistry,
};
pub use utxo::{
    AddressError, BlockCountReader, ChainParams, RpcBlockCountReader, UtxoAddress, UtxoBridge,
};
pub use watcher::HeightWatcher;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by bridges while building transactions or reading chains
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("build swap tx on wrong endpoint: {chain} is the {role} side")]
    WrongEndpoint { chain: String, role: &'static str },

    #[error("unknown pair id '{0}'")]
    UnknownPairId(String),

    #[error("can not swap to empty or invalid address '{0}'")]
    InvalidRecipient(String),

    #[error("invalid swap id '{0}'")]
    InvalidSwapId(String),

    #[error("invalid token address '{0}' in pair config")]
    InvalidTokenAddress(String),

    #[error("insufficient balance of {token} held by {holder}: have {have}, need {need}")]
    InsufficientBalance {
        token: String,
        holder: String,
        have: U256,
        need: U256,
    },

    #[error("{swap_type} transactions are not built by this bridge")]
    UnsupportedSwapType { swap_type: SwapType },

    #[error("building transactions is not supported on {0} chains")]
    BuildUnsupported(ChainFamily),

    #[error("address conversion is not supported on {0} chains")]
    ConvertUnsupported(ChainFamily),

    #[error("no bridge for chain id '{0}'")]
    UnknownChainId(String),

    #[error("invalid chain id '{0}'")]
    InvalidChainId(String),

    #[error("no signer configured for {0}")]
    NoSigner(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Address(#[from] AddressError),
}

// ============================================================================
// Build Requests
// ============================================================================

/// Request to build an outgoing swap transaction
#[derive(Debug, Clone)]
pub struct BuildTxArgs {
    /// Source transaction hash the swap settles
    pub swap_id: String,
    pub pair_id: String,
    pub bind: String,
    pub swap_type: SwapType,
    /// Value observed on the originating chain
    pub origin_value: U256,
    /// Explicit nonce; `None` takes a pending override if one is set
    pub nonce: Option<u64>,
    pub gas_price: Option<u128>,
}

/// Chain-native transaction fields, ready for the signing path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub chain_id: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub nonce: Option<u64>,
    pub gas_price: Option<u128>,
    /// Amount released to the recipient
    pub swap_value: U256,
}

impl RawTransaction {
    /// Convert into an alloy request for signing and submission
    pub fn into_request(self) -> TransactionRequest {
        let mut req = TransactionRequest::default()
            .to(self.to)
            .value(self.value)
            .input(self.input.into());
        req.chain_id = Some(self.chain_id);
        req.nonce = self.nonce;
        req.gas_price = self.gas_price;
        req
    }
}

/// Pending nonce override for the next outgoing transaction of a pair
pub trait NonceSetter: Send + Sync {
    fn set_nonce(&self, pair_id: &str, nonce: u64);

    /// Override waiting to be used, if any
    fn pending_nonce(&self, pair_id: &str) -> Option<u64>;
}

// ============================================================================
// Bridge
// ============================================================================

/// State shared by every bridge regardless of chain family
#[derive(Debug)]
pub struct BridgeCommon {
    pub chain: ChainConfig,
    /// Source (`true`) or destination (`false`) endpoint
    pub is_src: bool,
    pairs: Arc<TokenPairRegistry>,
    latest_height: AtomicU64,
}

impl BridgeCommon {
    pub fn new(chain: ChainConfig, is_src: bool, pairs: Arc<TokenPairRegistry>) -> Self {
        Self {
            chain,
            is_src,
            pairs,
            latest_height: AtomicU64::new(0),
        }
    }

    pub fn role(&self) -> &'static str {
        if self.is_src {
            "source"
        } else {
            "destination"
        }
    }

    pub fn pairs(&self) -> &TokenPairRegistry {
        &self.pairs
    }

    pub(crate) fn pair(&self, pair_id: &str) -> Result<Arc<PairEntry>, TokenError> {
        self.pairs
            .get(pair_id)
            .ok_or_else(|| TokenError::UnknownPairId(pair_id.to_string()))
    }

    pub(crate) fn wrong_endpoint(&self) -> TokenError {
        TokenError::WrongEndpoint {
            chain: self.chain.block_chain.clone(),
            role: self.role(),
        }
    }
}

/// A connected chain
pub enum Bridge {
    Eth(EthBridge),
    Utxo(UtxoBridge),
}

impl Bridge {
    /// Build the bridge for one side from its chain config
    pub fn from_config(
        chain: &ChainConfig,
        is_src: bool,
        pairs: Arc<TokenPairRegistry>,
    ) -> eyre::Result<Self> {
        let common = BridgeCommon::new(chain.clone(), is_src, pairs);
        Ok(match chain.family {
            ChainFamily::Evm => {
                let reader = RpcEvmReader::new(&chain.rpc_url)?;
                let mut bridge = EthBridge::new(common, Arc::new(reader))?;
                if let Some(key) = &chain.signer_key {
                    let submitter = RpcTxSubmitter::new(&chain.rpc_url, key)?;
                    info!(
                        chain = %chain.block_chain,
                        signer = %submitter.address(),
                        "Transaction signer configured"
                    );
                    bridge = bridge.with_submitter(Arc::new(submitter));
                }
                Bridge::Eth(bridge)
            }
            ChainFamily::Utxo => {
                let mut bridge = UtxoBridge::new(common)?;
                if !chain.rpc_url.is_empty() {
                    bridge = bridge.with_reader(Arc::new(RpcBlockCountReader::new(&chain.rpc_url)?));
                }
                Bridge::Utxo(bridge)
            }
        })
    }

    pub fn common(&self) -> &BridgeCommon {
        match self {
            Bridge::Eth(b) => b.common(),
            Bridge::Utxo(b) => b.common(),
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Bridge::Eth(_) => ChainFamily::Evm,
            Bridge::Utxo(_) => ChainFamily::Utxo,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.common().chain.chain_id
    }

    pub fn is_src(&self) -> bool {
        self.common().is_src
    }

    /// Token config of this bridge's side of a pair
    pub fn token_config(&self, pair_id: &str) -> Option<TokenConfig> {
        let common = self.common();
        common
            .pairs
            .get(pair_id)
            .map(|entry| entry.token(common.is_src).clone())
    }

    /// Latest height recorded by the height watcher
    pub fn latest_block_height(&self) -> u64 {
        self.common().latest_height.load(Ordering::Acquire)
    }

    pub fn set_latest_block_height(&self, height: u64) {
        self.common().latest_height.store(height, Ordering::Release);
    }

    /// Latest height read from the chain; a utxo bridge without a node
    /// reader reports the cached height
    pub async fn get_latest_block_number(&self) -> Result<u64, TokenError> {
        match self {
            Bridge::Eth(b) => b.latest_block_number().await,
            Bridge::Utxo(b) => match b.latest_block_number().await {
                Some(height) => height,
                None => Ok(self.latest_block_height()),
            },
        }
    }

    /// Nonce override capability, if this chain family has one
    pub fn nonce_setter(&self) -> Option<&dyn NonceSetter> {
        match self {
            Bridge::Eth(b) => Some(b),
            Bridge::Utxo(_) => None,
        }
    }

    pub async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, TokenError> {
        match self {
            Bridge::Eth(b) => b.build_raw_transaction(args).await,
            Bridge::Utxo(_) => Err(TokenError::BuildUnsupported(ChainFamily::Utxo)),
        }
    }

    /// Sign and broadcast a transaction built by this bridge
    pub async fn submit_transaction(&self, tx: RawTransaction) -> Result<B256, TokenError> {
        match self {
            Bridge::Eth(b) => b.submit(tx).await,
            Bridge::Utxo(b) => Err(TokenError::NoSigner(b.common().chain.block_chain.clone())),
        }
    }

    /// Convert an address into this chain's format for the named network
    pub fn convert_address(&self, addr: &str, net: &str) -> Result<UtxoAddress, TokenError> {
        match self {
            Bridge::Eth(_) => Err(TokenError::ConvertUnsupported(ChainFamily::Evm)),
            Bridge::Utxo(b) => Ok(b.convert_address(addr, net)?),
        }
    }
}

/// The two endpoints plus a chain id index
pub struct BridgeRegistry {
    pub src: Arc<Bridge>,
    pub dst: Arc<Bridge>,
    by_chain_id: HashMap<String, Arc<Bridge>>,
}

impl BridgeRegistry {
    pub fn new(src: Bridge, dst: Bridge) -> Self {
        let src = Arc::new(src);
        let dst = Arc::new(dst);
        let mut by_chain_id = HashMap::new();
        by_chain_id.insert(src.chain_id().to_lowercase(), src.clone());
        by_chain_id.insert(dst.chain_id().to_lowercase(), dst.clone());
        Self {
            src,
            dst,
            by_chain_id,
        }
    }

    /// Build both bridges from the server config
    pub fn from_config(config: &Config, pairs: Arc<TokenPairRegistry>) -> eyre::Result<Self> {
        let src = Bridge::from_config(&config.src_chain, true, pairs.clone())?;
        let dst = Bridge::from_config(&config.dest_chain, false, pairs)?;
        Ok(Self::new(src, dst))
    }

    pub fn by_chain_id(&self, chain_id: &str) -> Option<&Arc<Bridge>> {
        self.by_chain_id.get(&chain_id.trim().to_lowercase())
    }

    /// Bridge that sends the outgoing transaction of a direction
    pub fn sender_for(&self, direction: SwapDirection) -> &Arc<Bridge> {
        match direction {
            SwapDirection::Swapin => &self.dst,
            SwapDirection::Swapout => &self.src,
        }
    }

    pub fn pairs(&self) -> &TokenPairRegistry {
        self.src.common().pairs()
    }
}

#[async_trait]
impl HeightSource for BridgeRegistry {
    fn cached_height(&self, swap_type: SwapType) -> u64 {
        match swap_type {
            SwapType::Swapin => self.dst.latest_block_height(),
            SwapType::Swapout => self.src.latest_block_height(),
            SwapType::RouterSwap => 0,
        }
    }

    async fn live_height(&self, chain_id: &str) -> Result<u64, TokenError> {
        let bridge = self
            .by_chain_id(chain_id)
            .ok_or_else(|| TokenError::UnknownChainId(chain_id.to_string()))?;
        bridge.get_latest_block_number().await
    }
}
