use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{eip712_domain, SolCall, SolStruct};
use safe_rpc::RpcError;
use safe_types::{Operation, SubTransaction, UserOperation};
use tracing::{debug, info};

use crate::account::{get_nonce, is_contract_deployed, AccountSetup, SafeAccount};
use crate::config::SafeContracts;
use crate::context::SafeContext;
use crate::contracts::{IMultiSend, ISafe4337Module, SafeOp};
use crate::signature::{dummy_signature, passkey_owner, VALID_AFTER, VALID_UNTIL};
use crate::{AccountError, Result};

/// Build an unsigned, unsponsored operation executing `transactions` from
/// `account`.
///
/// An undeployed account gets an init operation that deploys it; `setup`
/// must then describe the signers the address was derived from, and is
/// checked against `account`. Nonce, fees and gas limits are read fresh.
pub async fn create_user_operation(
    ctx: &SafeContext,
    account: Address,
    transactions: &[SubTransaction],
    setup: Option<&AccountSetup>,
) -> Result<UserOperation> {
    if transactions.is_empty() {
        return Err(AccountError::EmptyBatch);
    }

    let contracts = ctx.contracts();
    let deployed = is_contract_deployed(ctx.chain.as_ref(), account).await?;

    let mut op = if deployed {
        let nonce = get_nonce(ctx.chain.as_ref(), contracts.entry_point, account).await?;
        UserOperation::new(account, nonce, encode_call_data(contracts, transactions)?)
    } else {
        let setup = setup.ok_or(AccountError::MissingSetup(account))?;
        let safe = SafeAccount::compute(setup.clone(), contracts, ctx.webauthn())?;
        if safe.address != account {
            return Err(AccountError::AddressMismatch {
                expected: account,
                computed: safe.address,
            });
        }

        let mut batch = safe.init_transactions(contracts, ctx.webauthn())?;
        batch.extend_from_slice(transactions);

        let mut op = UserOperation::new(account, U256::ZERO, encode_call_data(contracts, &batch)?);
        op.factory = Some(contracts.proxy_factory);
        op.factory_data = Some(safe.factory_data);
        op
    };

    op.apply_fees(ctx.chain.gas_fees().await?);

    let placeholder = with_dummy_signature(ctx, &op)?;
    let limits = ctx
        .bundler
        .estimate_user_operation_gas(&placeholder, contracts.entry_point)
        .await?;
    op.apply_gas_limits(limits);

    debug!(
        sender = %op.sender,
        nonce = %op.nonce,
        init = op.is_init(),
        calls = transactions.len(),
        "Built user operation"
    );
    Ok(op)
}

/// Merge paymaster sponsorship into `op`. Without a paymaster the operation
/// is returned unchanged.
///
/// Safe to retry: sponsoring an already sponsored operation replaces the
/// previous sponsorship fields.
pub async fn sponsor_user_operation(
    ctx: &SafeContext,
    op: UserOperation,
) -> std::result::Result<UserOperation, RpcError> {
    let Some(paymaster) = &ctx.paymaster else {
        return Ok(op);
    };

    let placeholder = with_dummy_signature(ctx, &op).map_err(|e| RpcError::Decode(e.to_string()))?;
    let sponsorship = paymaster
        .sponsor_user_operation(
            &placeholder,
            ctx.contracts().entry_point,
            ctx.settings.sponsorship_policy_id.as_deref(),
        )
        .await?;

    let mut op = op;
    op.apply_sponsorship(&sponsorship);
    info!(sender = %op.sender, paymaster = %sponsorship.paymaster, "Operation sponsored");
    Ok(op)
}

fn with_dummy_signature(ctx: &SafeContext, op: &UserOperation) -> Result<UserOperation> {
    let signer = ctx.signer.signer();
    let owner = passkey_owner(&signer, op.nonce.is_zero(), ctx.contracts(), ctx.webauthn())?;
    let mut placeholder = op.clone();
    placeholder.signature = dummy_signature(&signer, owner);
    Ok(placeholder)
}

/// Safe 4337 module call data for a batch.
///
/// A single call goes straight through `executeUserOp`; several are
/// delegate-called through MultiSendCallOnly.
pub fn encode_call_data(
    contracts: &SafeContracts,
    transactions: &[SubTransaction],
) -> Result<Bytes> {
    let call = match transactions {
        [] => return Err(AccountError::EmptyBatch),
        [tx] => ISafe4337Module::executeUserOpCall {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: Operation::Call.as_u8(),
        },
        batch => {
            let mut packed = Vec::new();
            for tx in batch {
                tx.pack_for_multisend(Operation::Call, &mut packed);
            }
            ISafe4337Module::executeUserOpCall {
                to: contracts.multi_send_call_only,
                value: U256::ZERO,
                data: IMultiSend::multiSendCall {
                    transactions: packed.into(),
                }
                .abi_encode()
                .into(),
                operation: Operation::DelegateCall.as_u8(),
            }
        }
    };
    Ok(call.abi_encode().into())
}

/// EIP-712 `SafeOp` hash the owners sign, bound to the chain and the 4337
/// module. Recompute after any change to the operation.
pub fn user_op_hash(op: &UserOperation, chain_id: u64, contracts: &SafeContracts) -> B256 {
    let domain = eip712_domain! {
        chain_id: chain_id,
        verifying_contract: contracts.safe_4337_module,
    };

    let safe_op = SafeOp {
        safe: op.sender,
        nonce: op.nonce,
        initCode: op.init_code(),
        callData: op.call_data.clone(),
        verificationGasLimit: op.verification_gas_limit.saturating_to::<u128>(),
        callGasLimit: op.call_gas_limit.saturating_to::<u128>(),
        preVerificationGas: op.pre_verification_gas,
        maxPriorityFeePerGas: op.max_priority_fee_per_gas.saturating_to::<u128>(),
        maxFeePerGas: op.max_fee_per_gas.saturating_to::<u128>(),
        paymasterAndData: op.paymaster_and_data(),
        validAfter: alloy_primitives::aliases::U48::from(VALID_AFTER),
        validUntil: alloy_primitives::aliases::U48::from(VALID_UNTIL),
        entryPoint: contracts.entry_point,
    };

    safe_op.eip712_signing_hash(&domain)
}
