use alloy_primitives::{Address, U256};
use safe_types::{SubTransaction, UserOperationReceipt, WebAuthnCredential};
use tracing::info;

use crate::account::{AccountSetup, SafeAccount};
use crate::context::SafeContext;
use crate::direct::{execute_direct_transaction, report_failure, DirectTransaction};
use crate::events::EventSink;
use crate::recovery::RecoveryModule;
use crate::signer::{PasskeyProvider, SignerError};
use crate::{AccountError, FlowError, FlowResult};

/// First-time account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub email: String,
    /// Guardians attached in the deployment operation, in order.
    pub guardians: Vec<Address>,
    pub guardian_threshold: u64,
}

#[derive(Debug, Clone)]
pub struct DeployedAccount {
    pub account: SafeAccount,
    pub credential: WebAuthnCredential,
    pub receipt: UserOperationReceipt,
}

/// Create a passkey, derive the account it owns and deploy it in a single
/// signing ceremony, attaching recovery guardians on the way.
///
/// Guardian `i` (zero-based) is added with threshold
/// `min(guardian_threshold, i + 1)` so each intermediate state is valid.
/// Without guardians the deployment carries a zero-value self transfer.
pub async fn deploy_account_with_passkey(
    ctx: &SafeContext,
    provider: &dyn PasskeyProvider,
    module: &RecoveryModule,
    request: &DeploymentRequest,
    events: &EventSink,
) -> FlowResult<DeployedAccount> {
    let credential = provider
        .create_credential(&request.email)
        .await
        .map_err(|e| {
            let e = match e {
                SignerError::Cancelled => FlowError::Cancelled,
                SignerError::Failed(reason) => FlowError::Signing(reason),
            };
            report_failure(events, Address::ZERO, e)
        })?;

    let setup = AccountSetup::single_passkey(credential.public_key);
    let account = SafeAccount::compute(setup.clone(), ctx.contracts(), ctx.webauthn())
        .map_err(|e| report_failure(events, Address::ZERO, FlowError::Preparation(e)))?;

    let transactions = deployment_transactions(module, account.address, request)
        .map_err(|e| report_failure(events, account.address, FlowError::Preparation(e)))?;

    let ctx = ctx.with_signer(provider.signer_for(&credential));
    let direct = DirectTransaction::new(account.address, transactions).with_setup(setup);
    let receipt = execute_direct_transaction(&ctx, &direct, events).await?;

    info!(
        account = %account.address,
        guardians = request.guardians.len(),
        "Account deployed"
    );
    Ok(DeployedAccount {
        account,
        credential,
        receipt,
    })
}

fn deployment_transactions(
    module: &RecoveryModule,
    account: Address,
    request: &DeploymentRequest,
) -> Result<Vec<SubTransaction>, AccountError> {
    if request.guardians.is_empty() {
        return Ok(vec![SubTransaction::transfer(account, U256::ZERO)]);
    }

    if request.guardian_threshold == 0
        || request.guardian_threshold as usize > request.guardians.len()
    {
        return Err(AccountError::InvalidThreshold {
            threshold: request.guardian_threshold,
            signers: request.guardians.len(),
        });
    }

    let mut transactions = Vec::with_capacity(request.guardians.len() + 1);
    transactions.push(module.create_enable_module_transaction(account));
    for (i, guardian) in request.guardians.iter().enumerate() {
        let threshold = request.guardian_threshold.min(i as u64 + 1);
        transactions.push(module.create_add_guardian_transaction(*guardian, threshold));
    }
    Ok(transactions)
}
