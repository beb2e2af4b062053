//! Flow phases as standalone steps with typed outcomes. The direct and
//! nested flows compose these; nothing here emits events.

use alloy_primitives::{Address, Bytes, B256};
use safe_types::{SubTransaction, UserOperation};
use tracing::{debug, info};

use crate::account::AccountSetup;
use crate::context::SafeContext;
use crate::operation::{create_user_operation, sponsor_user_operation, user_op_hash};
use crate::signature::format_signature;
use crate::signer::SignerError;
use crate::{FlowError, FlowResult};

/// Built and sponsored operation together with the hash owners sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOperation {
    pub op: UserOperation,
    pub hash: B256,
}

impl PreparedOperation {
    pub fn sender(&self) -> Address {
        self.op.sender
    }
}

/// Build, sponsor and hash. The hash is taken after sponsorship, so it
/// covers the final contents.
pub async fn prepare(
    ctx: &SafeContext,
    account: Address,
    transactions: &[SubTransaction],
    setup: Option<&AccountSetup>,
) -> FlowResult<PreparedOperation> {
    let op = create_user_operation(ctx, account, transactions, setup)
        .await
        .map_err(FlowError::Preparation)?;
    let op = sponsor_user_operation(ctx, op)
        .await
        .map_err(FlowError::Sponsorship)?;

    let hash = user_op_hash(&op, ctx.settings.chain_id, ctx.contracts());
    debug!(sender = %op.sender, %hash, "Operation prepared");
    Ok(PreparedOperation { op, hash })
}

/// Run the passkey ceremony over the prepared hash and encode the result.
pub async fn sign(ctx: &SafeContext, prepared: &PreparedOperation) -> FlowResult<Bytes> {
    let raw = ctx.signer.sign(prepared.hash).await.map_err(|e| match e {
        SignerError::Cancelled => FlowError::Cancelled,
        SignerError::Failed(reason) => FlowError::Signing(reason),
    })?;

    // The shared signer stays owner until the first operation swaps in the verifier
    let is_init = prepared.op.nonce.is_zero();
    let signature = format_signature(&raw, is_init, ctx.contracts(), ctx.webauthn())
        .map_err(|e| FlowError::Signing(e.to_string()))?;

    info!(sender = %prepared.op.sender, is_init, "Operation signed");
    Ok(signature)
}
