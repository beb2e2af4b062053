use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use safe_types::{GasLimits, UserOperation, UserOperationReceipt};
use serde_json::json;
use tracing::info;

use crate::client::JsonRpcClient;
use crate::types::GasEstimate;
use crate::Result;

/// ERC-4337 bundler.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasLimits>;

    /// Submit a signed operation, returning the entry point's operation hash.
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<B256>;

    /// `None` while the operation is not yet included.
    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>>;
}

pub struct HttpBundler {
    client: JsonRpcClient,
}

impl HttpBundler {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Bundler for HttpBundler {
    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasLimits> {
        let estimate: GasEstimate = self
            .client
            .request("eth_estimateUserOperationGas", json!([user_op, entry_point]))
            .await?;

        Ok(GasLimits {
            call_gas_limit: estimate.call_gas_limit,
            verification_gas_limit: estimate.verification_gas_limit,
            pre_verification_gas: estimate.pre_verification_gas,
        })
    }

    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<B256> {
        let hash: B256 = self
            .client
            .request("eth_sendUserOperation", json!([user_op, entry_point]))
            .await?;

        info!(sender = %user_op.sender, user_op_hash = %hash, "User operation accepted by bundler");
        Ok(hash)
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>> {
        self.client
            .request("eth_getUserOperationReceipt", json!([user_op_hash]))
            .await
    }
}
