//! Signing and broadcast of outgoing transactions
//!
//! The provider is built with the recommended fillers, so fields left empty
//! on the `RawTransaction` (gas limit, fees) are filled from the node while
//! an explicit nonce or gas price is kept as given.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use eyre::WrapErr;
use tracing::info;

use crate::tokens::{RawTransaction, TokenError};

/// Signs and broadcasts a built transaction
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Account the transactions are sent from
    fn address(&self) -> Address;

    /// Sign and broadcast, returning the transaction hash
    async fn submit(&self, tx: RawTransaction) -> Result<B256, TokenError>;
}

/// Submitter signing with a local key over JSON-RPC
pub struct RpcTxSubmitter {
    rpc_url: Url,
    signer: PrivateKeySigner,
}

impl RpcTxSubmitter {
    pub fn new(rpc_url: &str, private_key: &str) -> eyre::Result<Self> {
        let rpc_url = rpc_url
            .parse()
            .wrap_err_with(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let signer: PrivateKeySigner = private_key.parse().wrap_err("Invalid signer key")?;
        Ok(Self { rpc_url, signer })
    }
}

#[async_trait]
impl TxSubmitter for RpcTxSubmitter {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, tx: RawTransaction) -> Result<B256, TokenError> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());

        let chain_id = tx.chain_id;
        let pending = provider
            .send_transaction(tx.into_request())
            .await
            .map_err(|e| TokenError::Rpc(format!("send transaction: {}", e)))?;

        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, chain_id, from = %self.signer.address(), "Transaction sent");
        Ok(tx_hash)
    }
}
