use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::WrapErr;

use super::abi::IERC20;
use crate::tokens::TokenError;

/// Read access to an account-based chain
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn block_number(&self) -> Result<u64, TokenError>;

    /// ERC20 balance of `holder`
    async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, TokenError>;
}

/// JSON-RPC reader over HTTP
pub struct RpcEvmReader {
    provider: RootProvider<Http<Client>>,
}

impl RpcEvmReader {
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
impl ChainReader for RpcEvmReader {
    async fn block_number(&self) -> Result<u64, TokenError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| TokenError::Rpc(format!("get block number: {}", e)))
    }

    async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, TokenError> {
        let contract = IERC20::new(token, &self.provider);
        let balance = contract
            .balanceOf(holder)
            .call()
            .await
            .map_err(|e| TokenError::Rpc(format!("balanceOf {} on {}: {}", holder, token, e)))?;
        Ok(balance._0)
    }
}
