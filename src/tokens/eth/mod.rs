//! Account-based (EVM) bridge
//!
//! Builds the outgoing swap transactions:
//! - swap-in on the destination chain calls `Swapin(txhash, account, amount)`
//!   on the pair's token contract
//! - swap-out on the source chain transfers the released amount to the bind
//!   address, either as an ERC20 `transfer` or as a native value transfer
//!
//! Routine transactions are signed by the external workers. A bridge
//! configured with a `TxSubmitter` can also sign and broadcast the
//! replacements requested by admin calls.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{calc_swapped_value, BridgeCommon, BuildTxArgs, NonceSetter, RawTransaction, TokenError};
use crate::types::SwapType;

pub mod abi;
pub mod reader;
pub mod submitter;

pub use reader::{ChainReader, RpcEvmReader};
pub use submitter::{RpcTxSubmitter, TxSubmitter};

use abi::{IERC20, SwapinCall};

/// Parse a recipient, refusing malformed and zero addresses
pub fn parse_recipient(bind: &str) -> Result<Address, TokenError> {
    let trimmed = bind.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        warn!(address = %bind, "Swap to wrong address");
        return Err(TokenError::InvalidRecipient(bind.to_string()));
    }
    let address =
        Address::from_str(hex).map_err(|_| TokenError::InvalidRecipient(bind.to_string()))?;
    if address == Address::ZERO {
        warn!(address = %bind, "Swap to zero address");
        return Err(TokenError::InvalidRecipient(bind.to_string()));
    }
    Ok(address)
}

fn parse_token_address(s: &str) -> Result<Address, TokenError> {
    Address::from_str(s.trim()).map_err(|_| TokenError::InvalidTokenAddress(s.to_string()))
}

/// Bridge for an account-based chain
pub struct EthBridge {
    common: BridgeCommon,
    chain_id: u64,
    reader: Arc<dyn ChainReader>,
    submitter: Option<Arc<dyn TxSubmitter>>,
    /// Pending nonce overrides keyed by lowercase pair id
    nonces: Mutex<HashMap<String, u64>>,
}

impl EthBridge {
    pub fn new(common: BridgeCommon, reader: Arc<dyn ChainReader>) -> Result<Self, TokenError> {
        let chain_id = common
            .chain
            .chain_id
            .parse()
            .map_err(|_| TokenError::InvalidChainId(common.chain.chain_id.clone()))?;
        Ok(Self {
            common,
            chain_id,
            reader,
            submitter: None,
            nonces: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn TxSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Sign and broadcast a built transaction
    pub async fn submit(&self, tx: RawTransaction) -> Result<B256, TokenError> {
        match &self.submitter {
            Some(submitter) => submitter.submit(tx).await,
            None => Err(TokenError::NoSigner(self.common.chain.block_chain.clone())),
        }
    }

    pub fn common(&self) -> &BridgeCommon {
        &self.common
    }

    pub async fn latest_block_number(&self) -> Result<u64, TokenError> {
        self.reader.block_number().await
    }

    /// Build the outgoing transaction for a swap
    pub async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, TokenError> {
        let mut tx = match args.swap_type {
            SwapType::Swapin => self.build_swapin_tx_input(args).await?,
            SwapType::Swapout => self.build_swapout_tx_input(args)?,
            swap_type => return Err(TokenError::UnsupportedSwapType { swap_type }),
        };

        tx.nonce = match args.nonce {
            Some(nonce) => Some(nonce),
            None => self.take_nonce(&args.pair_id),
        };
        tx.gas_price = args.gas_price;

        debug!(
            pair_id = %args.pair_id,
            swap_id = %args.swap_id,
            to = %tx.to,
            swap_value = %tx.swap_value,
            nonce = ?tx.nonce,
            "Built swap transaction"
        );
        Ok(tx)
    }

    /// Input for `Swapin(bytes32 txhash, address account, uint256 amount)`
    pub async fn build_swapin_tx_input(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, TokenError> {
        if self.common.is_src {
            return Err(self.common.wrong_endpoint());
        }
        let pair = self.common.pair(&args.pair_id)?;
        let token = pair.token(false);

        let txhash = B256::from_str(args.swap_id.trim())
            .map_err(|_| TokenError::InvalidSwapId(args.swap_id.clone()))?;
        let account = parse_recipient(&args.bind)?;
        let amount = calc_swapped_value(pair.config(), args.origin_value, true);

        let input = SwapinCall {
            txhash,
            account,
            amount,
        }
        .abi_encode();
        let to = parse_token_address(&token.contract_address)?;

        if token.is_delegate_contract {
            self.check_balance(&token.delegate_token, to, amount).await?;
        }

        Ok(RawTransaction {
            chain_id: self.chain_id,
            to,
            value: U256::ZERO,
            input: Bytes::from(input),
            nonce: None,
            gas_price: None,
            swap_value: amount,
        })
    }

    /// Transfer of the released amount to the bind address
    pub fn build_swapout_tx_input(&self, args: &BuildTxArgs) -> Result<RawTransaction, TokenError> {
        if !self.common.is_src {
            return Err(self.common.wrong_endpoint());
        }
        let pair = self.common.pair(&args.pair_id)?;
        let token = pair.token(true);

        let receiver = parse_recipient(&args.bind)?;
        let amount = calc_swapped_value(pair.config(), args.origin_value, false);

        let (to, value, input) = if token.is_native() {
            (receiver, amount, Bytes::new())
        } else {
            let input = IERC20::transferCall {
                to: receiver,
                amount,
            }
            .abi_encode();
            (
                parse_token_address(&token.contract_address)?,
                U256::ZERO,
                Bytes::from(input),
            )
        };

        Ok(RawTransaction {
            chain_id: self.chain_id,
            to,
            value,
            input,
            nonce: None,
            gas_price: None,
            swap_value: amount,
        })
    }

    /// Verify a delegate contract holds enough of the underlying token
    async fn check_balance(
        &self,
        delegate_token: &str,
        holder: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let token = parse_token_address(delegate_token)?;
        let balance = self.reader.erc20_balance(token, holder).await?;
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                token: delegate_token.to_string(),
                holder: holder.to_string(),
                have: balance,
                need: amount,
            });
        }
        Ok(())
    }

    fn take_nonce(&self, pair_id: &str) -> Option<u64> {
        self.nonces.lock().remove(&pair_id.trim().to_lowercase())
    }
}

impl NonceSetter for EthBridge {
    fn set_nonce(&self, pair_id: &str, nonce: u64) {
        self.nonces.lock().insert(pair_id.trim().to_lowercase(), nonce);
        info!(
            chain = %self.common.chain.block_chain,
            pair_id = %pair_id,
            nonce,
            "Nonce override set"
        );
    }

    fn pending_nonce(&self, pair_id: &str) -> Option<u64> {
        self.nonces.lock().get(&pair_id.trim().to_lowercase()).copied()
    }
}
