use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::WrapErr;

use crate::tokens::TokenError;

/// Read access to a UTXO chain node
#[async_trait]
pub trait BlockCountReader: Send + Sync {
    async fn block_count(&self) -> Result<u64, TokenError>;
}

/// Node JSON-RPC (`getblockcount`) over HTTP; credentials go in the URL
pub struct RpcBlockCountReader {
    provider: RootProvider<Http<Client>>,
}

impl RpcBlockCountReader {
    pub fn new(rpc_url: &str) -> eyre::Result<Self> {
        let url = rpc_url
            .parse()
            .wrap_err_with(|| format!("Invalid RPC URL: {}", rpc_url))?;
        Ok(Self {
            provider: ProviderBuilder::new().on_http(url),
        })
    }
}

#[async_trait]
impl BlockCountReader for RpcBlockCountReader {
    async fn block_count(&self) -> Result<u64, TokenError> {
        self.provider
            .raw_request::<_, u64>("getblockcount".into(), Vec::<u64>::new())
            .await
            .map_err(|e| TokenError::Rpc(format!("getblockcount: {}", e)))
    }
}
