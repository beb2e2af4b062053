use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Outcome of an included user operation as reported by the bundler.
///
/// `success == false` means the operation landed and reverted: gas was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub sender: Address,
    pub nonce: U256,
    pub success: bool,
    #[serde(default)]
    pub actual_gas_cost: U256,
    #[serde(default)]
    pub actual_gas_used: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
}
