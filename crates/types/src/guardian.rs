use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// A guardian as seen after reconciling off-chain records with chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianStatus {
    pub address: Address,
    /// Off-chain record id, `None` for guardians only known on-chain.
    pub record_id: Option<String>,
    pub identifier: Option<String>,
    pub on_chain: bool,
}
