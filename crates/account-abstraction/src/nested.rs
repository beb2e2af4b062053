use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use safe_types::{SubTransaction, UserOperationReceipt};
use tracing::info;

use crate::account::AccountSetup;
use crate::context::SafeContext;
use crate::contracts::ISafe;
use crate::direct::report_failure;
use crate::events::{EventSink, FlowEvent, FlowPhase};
use crate::phases::{prepare, sign};
use crate::signature::approved_hash_signature;
use crate::submission::{send_user_operation, track_user_operation_response};
use crate::FlowResult;

/// "Account A pays through account B": `approver` (A) authorizes, `executor`
/// (B) holds the asset and runs `transactions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedTransaction {
    pub approver: Address,
    /// Required when the approver is not deployed yet.
    pub approver_setup: Option<AccountSetup>,
    pub executor: Address,
    pub transactions: Vec<SubTransaction>,
}

/// Receipts of both phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedReceipts {
    pub approval: UserOperationReceipt,
    pub execution: UserOperationReceipt,
}

/// Two-phase approve-then-execute.
///
/// 1. Build and sponsor the executor's operation; only its hash is used now.
/// 2. Build and sponsor the approver's `approveHash(hash)` call on the executor.
/// 3. Sign the approver's operation, submit it and wait for inclusion.
/// 4. Submit the executor's operation with an approved-hash signature naming
///    the approver, and wait for inclusion.
///
/// The executor's operation is never submitted before the approval is
/// included. `Signing`/`SigningComplete` fire once, for the approver's
/// passkey. `Sent` fires twice, with [`FlowPhase::Approval`] then
/// [`FlowPhase::Execution`].
pub async fn execute_nested_transaction(
    ctx: &SafeContext,
    request: &NestedTransaction,
    events: &EventSink,
) -> FlowResult<NestedReceipts> {
    match run(ctx, request, events).await {
        Ok(receipts) => {
            info!(
                approver = %request.approver,
                executor = %request.executor,
                user_op_hash = %receipts.execution.user_op_hash,
                "Nested transaction executed"
            );
            events.emit(FlowEvent::Success {
                receipt: Box::new(receipts.execution.clone()),
            });
            Ok(receipts)
        }
        Err(e) => Err(report_failure(events, request.approver, e)),
    }
}

async fn run(
    ctx: &SafeContext,
    request: &NestedTransaction,
    events: &EventSink,
) -> FlowResult<NestedReceipts> {
    events.emit(FlowEvent::Preparing);

    let execution = prepare(ctx, request.executor, &request.transactions, None).await?;

    let approve = SubTransaction::call(
        request.executor,
        ISafe::approveHashCall {
            hashToApprove: execution.hash,
        }
        .abi_encode(),
    );
    let approval = prepare(
        ctx,
        request.approver,
        std::slice::from_ref(&approve),
        request.approver_setup.as_ref(),
    )
    .await?;

    events.emit(FlowEvent::Signing);
    let signature = sign(ctx, &approval).await?;
    events.emit(FlowEvent::SigningComplete);

    let response = send_user_operation(ctx, approval.op, signature).await?;
    events.emit(FlowEvent::Sent {
        phase: FlowPhase::Approval,
        user_op_hash: response.user_op_hash,
    });
    let approval_receipt = track_user_operation_response(&response).await?;
    info!(executor = %request.executor, hash = %execution.hash, "Approval included");

    let response = send_user_operation(
        ctx,
        execution.op,
        approved_hash_signature(request.approver),
    )
    .await?;
    events.emit(FlowEvent::Sent {
        phase: FlowPhase::Execution,
        user_op_hash: response.user_op_hash,
    });
    let execution_receipt = track_user_operation_response(&response).await?;

    Ok(NestedReceipts {
        approval: approval_receipt,
        execution: execution_receipt,
    })
}
