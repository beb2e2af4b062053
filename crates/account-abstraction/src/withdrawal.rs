use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use safe_types::SubTransaction;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::account::AccountSetup;
use crate::config::RetryPolicy;
use crate::context::SafeContext;
use crate::direct::report_failure;
use crate::events::{EventSink, FlowEvent};
use crate::nested::{execute_nested_transaction, NestedReceipts, NestedTransaction};
use crate::{FlowError, FlowResult, ServiceError};

/// Withdrawal of `amount` of `token` from the asset-holding account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub account: Address,
    pub token: Address,
    pub amount: U256,
    pub recipient: Address,
}

/// Polling contract of the withdrawal-signature service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WithdrawalSignatureResponse {
    Ready {
        signature: Bytes,
        #[serde(default, rename = "expiresAt", skip_serializing_if = "Option::is_none")]
        expires_at: Option<u64>,
    },
    Pending {
        /// Seconds to wait before asking again.
        #[serde(rename = "retryAfter")]
        retry_after: u64,
    },
}

#[async_trait]
pub trait WithdrawalSignatureService: Send + Sync {
    async fn request_signature(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalSignatureResponse, ServiceError>;
}

/// Poll until the service returns a signature.
///
/// Every pending answer emits `Preparing` and sleeps for its `retry_after`.
/// Gives up with [`FlowError::WithdrawalSignature`] after
/// `policy.max_attempts` requests or once the next wait would exceed
/// `policy.max_wait`.
pub async fn await_withdrawal_signature(
    service: &dyn WithdrawalSignatureService,
    request: &WithdrawalRequest,
    policy: RetryPolicy,
    events: &EventSink,
) -> FlowResult<Bytes> {
    let mut waited = Duration::ZERO;

    for attempt in 1..=policy.max_attempts {
        let response = service
            .request_signature(request)
            .await
            .map_err(|e| FlowError::WithdrawalSignature(e.to_string()))?;

        match response {
            WithdrawalSignatureResponse::Ready { signature, .. } => {
                info!(account = %request.account, attempt, "Withdrawal signature ready");
                return Ok(signature);
            }
            WithdrawalSignatureResponse::Pending { retry_after } => {
                let delay = Duration::from_secs(retry_after);
                if attempt == policy.max_attempts || waited + delay > policy.max_wait() {
                    break;
                }

                debug!(account = %request.account, attempt, retry_after, "Withdrawal signature pending");
                events.emit(FlowEvent::Preparing);
                sleep(delay).await;
                waited += delay;
            }
        }
    }

    warn!(account = %request.account, waited_secs = waited.as_secs(), "Withdrawal signature never became ready");
    Err(FlowError::WithdrawalSignature(format!(
        "not ready after {} attempts and {}s",
        policy.max_attempts,
        waited.as_secs()
    )))
}

/// Withdraw from `request.account` on behalf of `approver`.
///
/// Waits for the service signature, lets `build` turn it into the executor's
/// sub-transactions, then runs the nested flow with `approver` approving.
#[allow(clippy::too_many_arguments)]
pub async fn execute_withdrawal<F>(
    ctx: &SafeContext,
    service: &dyn WithdrawalSignatureService,
    approver: Address,
    approver_setup: Option<AccountSetup>,
    request: &WithdrawalRequest,
    policy: RetryPolicy,
    build: F,
    events: &EventSink,
) -> FlowResult<NestedReceipts>
where
    F: FnOnce(&WithdrawalRequest, &Bytes) -> Vec<SubTransaction> + Send,
{
    let signature = await_withdrawal_signature(service, request, policy, events)
        .await
        .map_err(|e| report_failure(events, approver, e))?;

    let nested = NestedTransaction {
        approver,
        approver_setup,
        executor: request.account,
        transactions: build(request, &signature),
    };
    execute_nested_transaction(ctx, &nested, events).await
}
