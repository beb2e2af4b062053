use alloy_primitives::{Address, B256};
use safe_rpc::RpcError;
use safe_types::UserOperationReceipt;
use thiserror::Error;

/// Errors from account primitives and operation construction.
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("Invalid signer set: {0}")]
    InvalidSigners(String),

    #[error("Invalid threshold {threshold} for {signers} signers")]
    InvalidThreshold { threshold: u64, signers: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Account {0} is not deployed")]
    NotDeployed(Address),

    #[error("Account {0} is not deployed and no setup was provided")]
    MissingSetup(Address),

    #[error("{guardian} is not a guardian of {account}")]
    NotGuardian { account: Address, guardian: Address },

    #[error("Contract read on {address} reverted: {reason}")]
    ReadReverted { address: Address, reason: String },

    #[error("Counterfactual address mismatch: expected {expected}, computed {computed}")]
    AddressMismatch { expected: Address, computed: Address },

    #[error("No transactions to execute")]
    EmptyBatch,

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type Result<T> = std::result::Result<T, AccountError>;

/// Errors raised by off-chain collaborators (recovery, withdrawal and passkey services).
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Outcome taxonomy of an execution flow.
///
/// The variants separate "never reached the chain" (everything before
/// `ExecutionFailed`) from "landed on chain" (`ExecutionFailed`,
/// `Reconciliation`) so callers never mistake a reverted or half-reconciled
/// operation for one that did not run.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("Signing was cancelled by the user")]
    Cancelled,

    #[error("Failed to prepare operation: {0}")]
    Preparation(#[source] AccountError),

    #[error("Sponsorship failed: {0}")]
    Sponsorship(#[source] RpcError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Bundler rejected operation: {0}")]
    Submission(#[source] RpcError),

    #[error("Operation {user_op_hash} was included but reverted")]
    ExecutionFailed {
        user_op_hash: B256,
        receipt: Box<UserOperationReceipt>,
    },

    #[error("Operation {user_op_hash} was not included before the timeout")]
    InclusionTimeout { user_op_hash: B256 },

    #[error("Chain read failed: {0}")]
    Chain(#[source] AccountError),

    #[error("Backend request failed: {0}")]
    Backend(#[source] ServiceError),

    #[error("Withdrawal signature unavailable: {0}")]
    WithdrawalSignature(String),

    #[error("On-chain step succeeded but off-chain update failed: {reason}")]
    Reconciliation {
        receipt: Box<UserOperationReceipt>,
        reason: String,
    },
}

impl FlowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }

    /// Whether the operation may have changed chain state.
    ///
    /// A timed-out operation may still be included later, so it counts.
    pub fn landed_on_chain(&self) -> bool {
        matches!(
            self,
            FlowError::ExecutionFailed { .. }
                | FlowError::Reconciliation { .. }
                | FlowError::InclusionTimeout { .. }
        )
    }
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
