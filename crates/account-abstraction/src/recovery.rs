use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use safe_rpc::ChainReader;
use safe_types::{
    contains_address, parse_address_lenient, GuardianStatus, SubTransaction, UserOperationReceipt,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::{is_contract_deployed, read_contract};
use crate::config::{GracePeriod, RecoveryModuleConfig};
use crate::context::SafeContext;
use crate::contracts::{ISafe, ISocialRecoveryModule, SENTINEL};
use crate::direct::{execute_direct_transaction, report_failure, DirectTransaction};
use crate::events::EventSink;
use crate::{AccountError, FlowError, FlowResult, Result, ServiceError};

/// A social recovery module deployment and the calls that manage it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryModule {
    config: RecoveryModuleConfig,
}

impl RecoveryModule {
    pub fn new(config: RecoveryModuleConfig) -> Self {
        Self { config }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn grace_period(&self) -> GracePeriod {
        self.config.grace_period
    }

    /// An undeployed account has no modules.
    pub async fn is_module_enabled(
        &self,
        chain: &dyn ChainReader,
        account: Address,
    ) -> Result<bool> {
        if !is_contract_deployed(chain, account).await? {
            return Ok(false);
        }
        let enabled = read_contract(
            chain,
            account,
            ISafe::isModuleEnabledCall {
                module: self.config.address,
            },
        )
        .await?;
        Ok(enabled._0)
    }

    /// Zero when the module is not enabled: no recovery configured.
    pub async fn guardian_threshold(
        &self,
        chain: &dyn ChainReader,
        account: Address,
    ) -> Result<u64> {
        if !self.is_module_enabled(chain, account).await? {
            return Ok(0);
        }
        let threshold = read_contract(
            chain,
            self.config.address,
            ISocialRecoveryModule::thresholdCall { wallet: account },
        )
        .await?;
        Ok(threshold._0.saturating_to::<u64>())
    }

    /// Guardians in module list order. Empty when the module is not enabled.
    pub async fn guardians(
        &self,
        chain: &dyn ChainReader,
        account: Address,
    ) -> Result<Vec<Address>> {
        if !self.is_module_enabled(chain, account).await? {
            return Ok(Vec::new());
        }
        let guardians = read_contract(
            chain,
            self.config.address,
            ISocialRecoveryModule::getGuardiansCall { wallet: account },
        )
        .await?;
        Ok(guardians._0)
    }

    pub async fn is_guardian(
        &self,
        chain: &dyn ChainReader,
        account: Address,
        guardian: Address,
    ) -> Result<bool> {
        if !self.is_module_enabled(chain, account).await? {
            return Ok(false);
        }
        let is_guardian = read_contract(
            chain,
            self.config.address,
            ISocialRecoveryModule::isGuardianCall {
                wallet: account,
                guardian,
            },
        )
        .await?;
        Ok(is_guardian._0)
    }

    pub fn create_enable_module_transaction(&self, account: Address) -> SubTransaction {
        SubTransaction::call(
            account,
            ISafe::enableModuleCall {
                module: self.config.address,
            }
            .abi_encode(),
        )
    }

    pub fn create_add_guardian_transaction(
        &self,
        guardian: Address,
        threshold: u64,
    ) -> SubTransaction {
        SubTransaction::call(
            self.config.address,
            ISocialRecoveryModule::addGuardianWithThresholdCall {
                guardian,
                threshold: U256::from(threshold),
            }
            .abi_encode(),
        )
    }

    pub fn create_change_threshold_transaction(&self, threshold: u64) -> SubTransaction {
        SubTransaction::call(
            self.config.address,
            ISocialRecoveryModule::changeThresholdCall {
                threshold: U256::from(threshold),
            }
            .abi_encode(),
        )
    }

    /// Revoke `guardian`, clamping the threshold with [`revoke_threshold`].
    ///
    /// Reads the guardian list to find the linked-list predecessor.
    pub async fn create_revoke_guardian_transaction(
        &self,
        chain: &dyn ChainReader,
        account: Address,
        guardian: Address,
        current_threshold: u64,
    ) -> Result<SubTransaction> {
        let guardians = self.guardians(chain, account).await?;
        let index = guardians
            .iter()
            .position(|g| *g == guardian)
            .ok_or(AccountError::NotGuardian { account, guardian })?;

        let prev_guardian = if index == 0 {
            SENTINEL
        } else {
            guardians[index - 1]
        };
        let threshold = revoke_threshold(guardians.len(), current_threshold);
        debug!(%account, %guardian, threshold, "Revoking guardian");

        Ok(SubTransaction::call(
            self.config.address,
            ISocialRecoveryModule::revokeGuardianWithThresholdCall {
                prevGuardian: prev_guardian,
                guardian,
                threshold: U256::from(threshold),
            }
            .abi_encode(),
        ))
    }
}

/// Threshold to set when one of `guardian_count` guardians is revoked.
///
/// With two or fewer guardians left the threshold becomes the remaining
/// count. Otherwise the current threshold is kept, clamped to `[1, remaining]`.
pub fn revoke_threshold(guardian_count: usize, current_threshold: u64) -> u64 {
    let remaining = guardian_count.saturating_sub(1) as u64;
    if remaining <= 2 {
        remaining
    } else {
        current_threshold.clamp(1, remaining)
    }
}

/// Off-chain handle a guardian is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RecoveryIdentifier {
    Email(String),
    Phone(String),
}

impl std::fmt::Display for RecoveryIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryIdentifier::Email(email) => write!(f, "{}", email),
            RecoveryIdentifier::Phone(phone) => write!(f, "{}", phone),
        }
    }
}

/// Stored mapping of an identifier to its guardian address. Addresses come
/// back from the backend as strings in whatever casing it stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryWalletRecord {
    pub id: String,
    pub guardian_address: String,
    pub identifier: RecoveryIdentifier,
}

/// Off-chain persistence for recovery wallets.
#[async_trait]
pub trait RecoveryBackend: Send + Sync {
    /// Generate (or look up) the guardian address for an identifier.
    async fn generate_guardian(
        &self,
        account: Address,
        identifier: &RecoveryIdentifier,
    ) -> std::result::Result<Address, ServiceError>;

    async fn save_recovery_wallet(
        &self,
        account: Address,
        guardian: Address,
        identifier: &RecoveryIdentifier,
    ) -> std::result::Result<RecoveryWalletRecord, ServiceError>;

    async fn list_recovery_wallets(
        &self,
        account: Address,
    ) -> std::result::Result<Vec<RecoveryWalletRecord>, ServiceError>;

    async fn delete_recovery_wallet(
        &self,
        account: Address,
        record_id: &str,
    ) -> std::result::Result<(), ServiceError>;
}

/// Result of a recovery change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Already in the requested state; nothing was sent.
    Unchanged,
    Executed(Box<UserOperationReceipt>),
}

impl RecoveryOutcome {
    pub fn receipt(&self) -> Option<&UserOperationReceipt> {
        match self {
            RecoveryOutcome::Unchanged => None,
            RecoveryOutcome::Executed(receipt) => Some(receipt),
        }
    }
}

/// Guardian management on top of the direct flow.
///
/// Chain state is authoritative. Off-chain records are written only after
/// the on-chain change is included; a failed write afterwards is reported
/// as [`FlowError::Reconciliation`].
#[derive(Clone)]
pub struct RecoveryManager {
    ctx: SafeContext,
    module: RecoveryModule,
    backend: Arc<dyn RecoveryBackend>,
    default_guardian: Address,
}

impl RecoveryManager {
    pub fn new(
        ctx: SafeContext,
        module: RecoveryModule,
        backend: Arc<dyn RecoveryBackend>,
        default_guardian: Address,
    ) -> Self {
        Self {
            ctx,
            module,
            backend,
            default_guardian,
        }
    }

    pub fn module(&self) -> &RecoveryModule {
        &self.module
    }

    /// Turn the default guardian on or off.
    ///
    /// A no-op returning [`RecoveryOutcome::Unchanged`] when the account is
    /// already in the requested state.
    pub async fn toggle_recovery(
        &self,
        account: Address,
        enable: bool,
        threshold: u64,
        events: &EventSink,
    ) -> FlowResult<RecoveryOutcome> {
        let chain = self.ctx.chain.as_ref();
        let module_enabled = self
            .module
            .is_module_enabled(chain, account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;
        let active = module_enabled
            && self
                .module
                .is_guardian(chain, account, self.default_guardian)
                .await
                .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;

        if active == enable {
            debug!(%account, enable, "Recovery already in requested state");
            return Ok(RecoveryOutcome::Unchanged);
        }

        let transactions = if enable {
            self.check_add_threshold(account, threshold, events).await?;
            let mut txs = Vec::with_capacity(2);
            if !module_enabled {
                txs.push(self.module.create_enable_module_transaction(account));
            }
            txs.push(
                self.module
                    .create_add_guardian_transaction(self.default_guardian, threshold),
            );
            txs
        } else {
            vec![self
                .revoke_transaction(account, self.default_guardian)
                .await
                .map_err(|e| report_failure(events, account, e))?]
        };

        let receipt = self.execute(account, transactions, events).await?;
        info!(%account, enable, "Recovery toggled");
        Ok(RecoveryOutcome::Executed(Box::new(receipt)))
    }

    /// Add a guardian for an email or phone number.
    pub async fn add_recovery_method(
        &self,
        account: Address,
        identifier: RecoveryIdentifier,
        threshold: u64,
        events: &EventSink,
    ) -> FlowResult<RecoveryWalletRecord> {
        self.check_add_threshold(account, threshold, events).await?;

        let guardian = self
            .backend
            .generate_guardian(account, &identifier)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Backend(e)))?;

        let module_enabled = self
            .module
            .is_module_enabled(self.ctx.chain.as_ref(), account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;

        let mut transactions = Vec::with_capacity(2);
        if !module_enabled {
            transactions.push(self.module.create_enable_module_transaction(account));
        }
        transactions.push(self.module.create_add_guardian_transaction(guardian, threshold));

        let receipt = self.execute(account, transactions, events).await?;

        match self
            .backend
            .save_recovery_wallet(account, guardian, &identifier)
            .await
        {
            Ok(record) => {
                info!(%account, %guardian, "Recovery method added");
                Ok(record)
            }
            Err(e) => Err(report_failure(
                events,
                account,
                FlowError::Reconciliation {
                    receipt: Box::new(receipt),
                    reason: format!("guardian added on chain but not recorded: {}", e),
                },
            )),
        }
    }

    /// Revoke the guardian behind a stored recovery wallet and delete the
    /// record. A guardian already gone from chain only loses its record.
    pub async fn remove_recovery_method(
        &self,
        account: Address,
        record_id: &str,
        events: &EventSink,
    ) -> FlowResult<RecoveryOutcome> {
        let records = self
            .backend
            .list_recovery_wallets(account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Backend(e)))?;
        let record = records
            .into_iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| {
                report_failure(
                    events,
                    account,
                    FlowError::Backend(ServiceError::NotFound(format!(
                        "recovery wallet {}",
                        record_id
                    ))),
                )
            })?;
        let guardian = parse_address_lenient(&record.guardian_address).map_err(|e| {
            report_failure(
                events,
                account,
                FlowError::Preparation(AccountError::Decode(e.to_string())),
            )
        })?;

        let on_chain = self
            .module
            .is_guardian(self.ctx.chain.as_ref(), account, guardian)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;

        if !on_chain {
            warn!(%account, %guardian, "Guardian not found on chain, deleting stale record");
            self.backend
                .delete_recovery_wallet(account, record_id)
                .await
                .map_err(|e| report_failure(events, account, FlowError::Backend(e)))?;
            return Ok(RecoveryOutcome::Unchanged);
        }

        let transaction = self
            .revoke_transaction(account, guardian)
            .await
            .map_err(|e| report_failure(events, account, e))?;
        let receipt = self.execute(account, vec![transaction], events).await?;

        match self.backend.delete_recovery_wallet(account, record_id).await {
            Ok(()) => {
                info!(%account, %guardian, "Recovery method removed");
                Ok(RecoveryOutcome::Executed(Box::new(receipt)))
            }
            Err(e) => Err(report_failure(
                events,
                account,
                FlowError::Reconciliation {
                    receipt: Box::new(receipt),
                    reason: format!("guardian revoked on chain but record not deleted: {}", e),
                },
            )),
        }
    }

    /// Reject a threshold the guardian set cannot satisfy once one more
    /// guardian is added.
    async fn check_add_threshold(
        &self,
        account: Address,
        threshold: u64,
        events: &EventSink,
    ) -> FlowResult<()> {
        let guardians = self
            .module
            .guardians(self.ctx.chain.as_ref(), account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;
        let signers = guardians.len() + 1;

        if threshold == 0 || threshold as usize > signers {
            return Err(report_failure(
                events,
                account,
                FlowError::Preparation(AccountError::InvalidThreshold { threshold, signers }),
            ));
        }
        Ok(())
    }

    /// Set the number of guardian approvals a recovery needs.
    pub async fn change_guardian_threshold(
        &self,
        account: Address,
        threshold: u64,
        events: &EventSink,
    ) -> FlowResult<RecoveryOutcome> {
        let chain = self.ctx.chain.as_ref();
        let guardians = self
            .module
            .guardians(chain, account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;

        if threshold == 0 || threshold as usize > guardians.len() {
            return Err(report_failure(
                events,
                account,
                FlowError::Preparation(AccountError::InvalidThreshold {
                    threshold,
                    signers: guardians.len(),
                }),
            ));
        }

        let current = self
            .module
            .guardian_threshold(chain, account)
            .await
            .map_err(|e| report_failure(events, account, FlowError::Chain(e)))?;
        if current == threshold {
            return Ok(RecoveryOutcome::Unchanged);
        }

        let transaction = self.module.create_change_threshold_transaction(threshold);
        let receipt = self.execute(account, vec![transaction], events).await?;
        Ok(RecoveryOutcome::Executed(Box::new(receipt)))
    }

    /// Join stored recovery wallets with the on-chain guardian list.
    ///
    /// Every record is reported with its on-chain flag; on-chain guardians
    /// with no record are appended with no identifier. Comparison ignores
    /// address casing.
    pub async fn guardian_statuses(&self, account: Address) -> FlowResult<Vec<GuardianStatus>> {
        let on_chain = self
            .module
            .guardians(self.ctx.chain.as_ref(), account)
            .await
            .map_err(FlowError::Chain)?;
        let records = self
            .backend
            .list_recovery_wallets(account)
            .await
            .map_err(FlowError::Backend)?;

        let mut statuses = Vec::with_capacity(records.len() + on_chain.len());
        for record in &records {
            let address = match parse_address_lenient(&record.guardian_address) {
                Ok(address) => address,
                Err(e) => {
                    warn!(record = %record.id, error = %e, "Skipping recovery wallet with invalid address");
                    continue;
                }
            };
            statuses.push(GuardianStatus {
                address,
                record_id: Some(record.id.clone()),
                identifier: Some(record.identifier.to_string()),
                on_chain: contains_address(&on_chain, &record.guardian_address),
            });
        }

        for guardian in on_chain {
            if !statuses.iter().any(|s| s.address == guardian) {
                statuses.push(GuardianStatus {
                    address: guardian,
                    record_id: None,
                    identifier: None,
                    on_chain: true,
                });
            }
        }

        debug!(%account, guardians = statuses.len(), "Reconciled guardian statuses");
        Ok(statuses)
    }

    async fn revoke_transaction(
        &self,
        account: Address,
        guardian: Address,
    ) -> FlowResult<SubTransaction> {
        let chain = self.ctx.chain.as_ref();
        let current = self
            .module
            .guardian_threshold(chain, account)
            .await
            .map_err(FlowError::Chain)?;
        self.module
            .create_revoke_guardian_transaction(chain, account, guardian, current)
            .await
            .map_err(FlowError::Preparation)
    }

    async fn execute(
        &self,
        account: Address,
        transactions: Vec<SubTransaction>,
        events: &EventSink,
    ) -> FlowResult<UserOperationReceipt> {
        let request = DirectTransaction::new(account, transactions);
        execute_direct_transaction(&self.ctx, &request, events).await
    }
}
