use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use safe_account_abstraction::{
    deploy_account_with_passkey, execute_direct_transaction, execute_nested_transaction,
    execute_withdrawal, sync_passkeys_with_safe, DeployedAccount, DeploymentRequest,
    DirectTransaction, EventSink, FlowResult, NestedReceipts, NestedTransaction, PasskeyProvider,
    PasskeySigner, RecoveryBackend, RecoveryManager, RecoveryModule, SafeContext,
    WithdrawalRequest, WithdrawalSignatureService,
};
use safe_rpc::{HttpBundler, HttpChainReader, HttpPaymaster, JsonRpcClient};
use safe_types::{Passkey, RegisteredPasskey, SubTransaction, UserOperationReceipt};
use tracing::info;

use crate::config::Config;

/// Collaborators supplied by the embedding application.
pub struct Collaborators {
    /// Passkey that signs for the session's account
    pub signer: Arc<dyn PasskeySigner>,
    /// Creates credentials for new accounts
    pub passkeys: Arc<dyn PasskeyProvider>,
    /// Persists recovery methods
    pub recovery_backend: Arc<dyn RecoveryBackend>,
    /// Co-signs withdrawals
    pub withdrawals: Arc<dyn WithdrawalSignatureService>,
}

/// Wires configuration and collaborators into ready-to-run flows.
pub struct Orchestrator {
    config: Config,
    context: SafeContext,
    recovery: RecoveryManager,
    passkeys: Arc<dyn PasskeyProvider>,
    withdrawals: Arc<dyn WithdrawalSignatureService>,
}

impl Orchestrator {
    /// Validate `config` and build the HTTP clients it names. No request is
    /// made until a flow runs.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let timeout = config.chain.request_timeout();
        let chain = JsonRpcClient::with_timeout(&config.chain.rpc_url, timeout)
            .context("Failed to build chain client")?;
        let bundler = JsonRpcClient::with_timeout(&config.bundler.url, timeout)
            .context("Failed to build bundler client")?;

        let mut context = SafeContext::new(
            Arc::new(HttpChainReader::new(chain)),
            Arc::new(HttpBundler::new(bundler)),
            collaborators.signer,
            config.safe_settings(),
        );
        if let Some(url) = &config.paymaster.url {
            let paymaster = JsonRpcClient::with_timeout(url, timeout)
                .context("Failed to build paymaster client")?;
            context = context.with_paymaster(Arc::new(HttpPaymaster::new(paymaster)));
        }

        let module = RecoveryModule::new(config.recovery.select()?);
        let recovery = RecoveryManager::new(
            context.clone(),
            module,
            collaborators.recovery_backend,
            config.recovery.default_guardian,
        );

        info!(
            chain_id = config.chain.chain_id,
            sponsored = context.paymaster.is_some(),
            recovery_module = %module.address(),
            grace_period = ?module.grace_period(),
            "Orchestrator initialized"
        );

        Ok(Self {
            config,
            context,
            recovery,
            passkeys: collaborators.passkeys,
            withdrawals: collaborators.withdrawals,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &SafeContext {
        &self.context
    }

    pub fn recovery(&self) -> &RecoveryManager {
        &self.recovery
    }

    pub async fn execute(
        &self,
        request: &DirectTransaction,
        events: &EventSink,
    ) -> FlowResult<UserOperationReceipt> {
        execute_direct_transaction(&self.context, request, events).await
    }

    pub async fn execute_nested(
        &self,
        request: &NestedTransaction,
        events: &EventSink,
    ) -> FlowResult<NestedReceipts> {
        execute_nested_transaction(&self.context, request, events).await
    }

    pub async fn deploy_account(
        &self,
        request: &DeploymentRequest,
        events: &EventSink,
    ) -> FlowResult<DeployedAccount> {
        deploy_account_with_passkey(
            &self.context,
            self.passkeys.as_ref(),
            self.recovery.module(),
            request,
            events,
        )
        .await
    }

    pub async fn sync_passkeys(
        &self,
        account: Address,
        passkeys: &[RegisteredPasskey],
    ) -> Vec<Passkey> {
        sync_passkeys_with_safe(
            self.context.chain.as_ref(),
            self.context.webauthn(),
            account,
            passkeys,
        )
        .await
    }

    /// Withdraw from `request.account` with `approver` approving; `build`
    /// turns the service signature into the account's calls.
    pub async fn withdraw<F>(
        &self,
        approver: Address,
        request: &WithdrawalRequest,
        build: F,
        events: &EventSink,
    ) -> FlowResult<NestedReceipts>
    where
        F: FnOnce(&WithdrawalRequest, &alloy_primitives::Bytes) -> Vec<SubTransaction> + Send,
    {
        execute_withdrawal(
            &self.context,
            self.withdrawals.as_ref(),
            approver,
            None,
            request,
            self.config.withdrawal,
            build,
            events,
        )
        .await
    }
}
