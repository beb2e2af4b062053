use alloy_primitives::{Address, Bytes, U256, U64};
use async_trait::async_trait;
use safe_types::GasFees;
use serde_json::json;

use crate::client::JsonRpcClient;
use crate::types::{BlockFees, CallRequest};
use crate::Result;

/// Read-only chain access.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Deployed bytecode at `address`, empty when nothing is deployed.
    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// `eth_call` against the latest block. Reverts surface as `RpcError::Rpc`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Current EIP-1559 fee suggestion.
    async fn gas_fees(&self) -> Result<GasFees>;
}

/// [`ChainReader`] over a node's HTTP JSON-RPC endpoint.
pub struct HttpChainReader {
    client: JsonRpcClient,
}

impl HttpChainReader {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.client.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.client
            .request("eth_getCode", json!([address, "latest"]))
            .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = CallRequest { to, data };
        self.client
            .request("eth_call", json!([request, "latest"]))
            .await
    }

    async fn gas_fees(&self) -> Result<GasFees> {
        let priority: U256 = self
            .client
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await?;
        let block: BlockFees = self
            .client
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;

        // Headroom for two consecutive full blocks of base fee growth.
        let base_fee = block.base_fee_per_gas.unwrap_or_default();
        Ok(GasFees {
            max_fee_per_gas: base_fee * U256::from(2u64) + priority,
            max_priority_fee_per_gas: priority,
        })
    }
}
