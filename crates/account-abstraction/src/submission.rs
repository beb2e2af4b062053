use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use safe_rpc::Bundler;
use safe_types::{UserOperation, UserOperationReceipt};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::InclusionPolicy;
use crate::context::SafeContext;
use crate::{AccountError, FlowError, FlowResult};

/// Handle on a submitted operation.
pub struct UserOperationResponse {
    pub user_op_hash: B256,
    pub sender: Address,
    bundler: Arc<dyn Bundler>,
    policy: InclusionPolicy,
}

impl std::fmt::Debug for UserOperationResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserOperationResponse")
            .field("user_op_hash", &self.user_op_hash)
            .field("sender", &self.sender)
            .finish()
    }
}

impl UserOperationResponse {
    pub fn new(
        user_op_hash: B256,
        sender: Address,
        bundler: Arc<dyn Bundler>,
        policy: InclusionPolicy,
    ) -> Self {
        Self {
            user_op_hash,
            sender,
            bundler,
            policy,
        }
    }

    /// Poll the bundler until the operation is included.
    ///
    /// Returns the receipt whatever its `success` flag. Transport failures
    /// while polling are retried until the inclusion timeout.
    pub async fn included(&self) -> FlowResult<UserOperationReceipt> {
        let deadline = Instant::now() + self.policy.timeout();

        loop {
            match self.bundler.get_user_operation_receipt(self.user_op_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_transport() => {
                    warn!(user_op_hash = %self.user_op_hash, error = %e, "Receipt poll failed, retrying");
                }
                Err(e) => return Err(FlowError::Chain(AccountError::Rpc(e))),
            }

            if Instant::now() >= deadline {
                return Err(FlowError::InclusionTimeout {
                    user_op_hash: self.user_op_hash,
                });
            }
            sleep(self.policy.poll_interval()).await;
        }
    }
}

/// Attach `signature` and submit to the bundler.
pub async fn send_user_operation(
    ctx: &SafeContext,
    mut op: UserOperation,
    signature: Bytes,
) -> FlowResult<UserOperationResponse> {
    op.signature = signature;

    let user_op_hash = ctx
        .bundler
        .send_user_operation(&op, ctx.contracts().entry_point)
        .await
        .map_err(FlowError::Submission)?;

    info!(sender = %op.sender, nonce = %op.nonce, %user_op_hash, "User operation submitted");
    Ok(UserOperationResponse::new(
        user_op_hash,
        op.sender,
        ctx.bundler.clone(),
        ctx.settings.inclusion,
    ))
}

/// Await inclusion and classify the outcome: an included but reverted
/// operation is [`FlowError::ExecutionFailed`], never a submission error.
pub async fn track_user_operation_response(
    response: &UserOperationResponse,
) -> FlowResult<UserOperationReceipt> {
    let receipt = response.included().await?;

    if !receipt.success {
        warn!(
            user_op_hash = %response.user_op_hash,
            reason = receipt.reason.as_deref().unwrap_or("unknown"),
            "User operation reverted"
        );
        return Err(FlowError::ExecutionFailed {
            user_op_hash: response.user_op_hash,
            receipt: Box::new(receipt),
        });
    }

    debug!(user_op_hash = %response.user_op_hash, "User operation included");
    Ok(receipt)
}
