//! ERC-4337 orchestration for Safe smart accounts owned by passkeys.

pub mod account;
pub mod config;
pub mod context;
pub mod contracts;
pub mod deployment;
pub mod direct;
pub mod error;
pub mod events;
pub mod nested;
pub mod operation;
pub mod passkey_sync;
pub mod phases;
pub mod recovery;
pub mod signature;
pub mod signer;
pub mod submission;
pub mod withdrawal;

pub use account::{
    get_nonce, get_owners, get_threshold, is_contract_deployed, verifier_address, AccountSetup,
    SafeAccount,
};
pub use config::{
    GracePeriod, InclusionPolicy, RecoveryModuleConfig, RetryPolicy, SafeContracts,
    WebAuthnVerifierConfig,
};
pub use context::{SafeContext, SafeSettings};
pub use deployment::{deploy_account_with_passkey, DeployedAccount, DeploymentRequest};
pub use direct::{execute_direct_transaction, DirectTransaction};
pub use error::{AccountError, FlowError, FlowResult, Result, ServiceError};
pub use events::{EventSink, FlowEvent, FlowPhase};
pub use nested::{execute_nested_transaction, NestedReceipts, NestedTransaction};
pub use operation::{create_user_operation, encode_call_data, sponsor_user_operation, user_op_hash};
pub use passkey_sync::{
    create_add_passkey_owner_transaction, sync_passkey_records, sync_passkeys_with_safe,
};
pub use phases::PreparedOperation;
pub use recovery::{
    revoke_threshold, RecoveryBackend, RecoveryIdentifier, RecoveryManager, RecoveryModule,
    RecoveryOutcome, RecoveryWalletRecord,
};
pub use signature::{approved_hash_signature, format_signature};
pub use signer::{
    PasskeyAssertion, PasskeyProvider, PasskeySigner, RawSignature, SignerError, SignerSignature,
};
pub use submission::{send_user_operation, track_user_operation_response, UserOperationResponse};
pub use withdrawal::{
    await_withdrawal_signature, execute_withdrawal, WithdrawalRequest, WithdrawalSignatureResponse,
    WithdrawalSignatureService,
};
