use alloy_primitives::Address;
use async_trait::async_trait;
use safe_types::{Sponsorship, UserOperation};
use serde_json::json;
use tracing::debug;

use crate::client::JsonRpcClient;
use crate::types::SponsorshipContext;
use crate::Result;

/// Gas sponsorship service.
///
/// Sponsoring the same operation again must be safe: callers retry on
/// transient failures.
#[async_trait]
pub trait Paymaster: Send + Sync {
    async fn sponsor_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
        policy_id: Option<&str>,
    ) -> Result<Sponsorship>;
}

pub struct HttpPaymaster {
    client: JsonRpcClient,
}

impl HttpPaymaster {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Paymaster for HttpPaymaster {
    async fn sponsor_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
        policy_id: Option<&str>,
    ) -> Result<Sponsorship> {
        let context = SponsorshipContext {
            sponsorship_policy_id: policy_id.map(str::to_string),
        };

        debug!(sender = %user_op.sender, ?policy_id, "Requesting sponsorship");

        self.client
            .request(
                "pm_sponsorUserOperation",
                json!([user_op, entry_point, context]),
            )
            .await
    }
}
