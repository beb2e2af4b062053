use alloy_primitives::Address;
use safe_types::{SubTransaction, UserOperationReceipt};
use tracing::{error, info};

use crate::account::AccountSetup;
use crate::context::SafeContext;
use crate::events::{EventSink, FlowEvent};
use crate::phases::{prepare, sign};
use crate::submission::{send_user_operation, track_user_operation_response};
use crate::{FlowError, FlowResult};

/// A batch executed from one account in one signing round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectTransaction {
    pub account: Address,
    pub transactions: Vec<SubTransaction>,
    /// Required when the account is not deployed yet.
    pub setup: Option<AccountSetup>,
}

impl DirectTransaction {
    pub fn new(account: Address, transactions: Vec<SubTransaction>) -> Self {
        Self {
            account,
            transactions,
            setup: None,
        }
    }

    pub fn with_setup(mut self, setup: AccountSetup) -> Self {
        self.setup = Some(setup);
        self
    }
}

/// Execute `request` with the context's passkey.
///
/// Emits `Preparing`, `Signing`, `SigningComplete`, then `Success` once the
/// operation is included, or `Error` before returning any failure. No `Sent`
/// event is emitted. The caller must not run two flows against the same
/// account concurrently: both would read the same nonce.
pub async fn execute_direct_transaction(
    ctx: &SafeContext,
    request: &DirectTransaction,
    events: &EventSink,
) -> FlowResult<UserOperationReceipt> {
    match run(ctx, request, events).await {
        Ok(receipt) => {
            info!(account = %request.account, user_op_hash = %receipt.user_op_hash, "Direct transaction executed");
            events.emit(FlowEvent::Success {
                receipt: Box::new(receipt.clone()),
            });
            Ok(receipt)
        }
        Err(e) => Err(report_failure(events, request.account, e)),
    }
}

async fn run(
    ctx: &SafeContext,
    request: &DirectTransaction,
    events: &EventSink,
) -> FlowResult<UserOperationReceipt> {
    events.emit(FlowEvent::Preparing);
    let prepared = prepare(
        ctx,
        request.account,
        &request.transactions,
        request.setup.as_ref(),
    )
    .await?;

    events.emit(FlowEvent::Signing);
    let signature = sign(ctx, &prepared).await?;
    events.emit(FlowEvent::SigningComplete);

    let response = send_user_operation(ctx, prepared.op, signature).await?;
    track_user_operation_response(&response).await
}

/// Emit `Error` and hand the error back for returning.
pub(crate) fn report_failure(events: &EventSink, account: Address, e: FlowError) -> FlowError {
    if e.is_cancelled() {
        info!(%account, "Flow cancelled by user");
    } else {
        error!(%account, error = %e, "Flow failed");
    }
    events.emit(FlowEvent::Error { error: e.clone() });
    e
}
