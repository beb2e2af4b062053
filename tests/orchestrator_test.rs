use std::sync::Arc;

use alloy_primitives::{address, Address, Bytes, B256, U256};
use async_trait::async_trait;
use safe_account_abstraction::{
    EventSink, GracePeriod, PasskeyProvider, PasskeySigner, RecoveryBackend, RecoveryIdentifier,
    RecoveryModuleConfig, RecoveryWalletRecord, ServiceError, SignerError, SignerSignature,
    WithdrawalRequest, WithdrawalSignatureResponse, WithdrawalSignatureService,
};
use safe_orchestrator::{Collaborators, Config, Environment, Orchestrator};
use safe_types::{
    PasskeyStatus, PublicKeyCoordinates, RegisteredPasskey, Signer, WebAuthnCredential,
};
use tempfile::TempDir;

/// Nothing listens here: every request fails at the transport.
const UNREACHABLE: &str = "http://127.0.0.1:1";

struct Offline;

#[async_trait]
impl PasskeySigner for Offline {
    fn signer(&self) -> Signer {
        PublicKeyCoordinates::new(U256::from(1u64), U256::from(2u64)).into()
    }

    async fn sign(&self, _hash: B256) -> Result<SignerSignature, SignerError> {
        Err(SignerError::Failed("offline".into()))
    }
}

#[async_trait]
impl PasskeyProvider for Offline {
    async fn create_credential(&self, _email: &str) -> Result<WebAuthnCredential, SignerError> {
        Err(SignerError::Failed("offline".into()))
    }

    fn signer_for(&self, _credential: &WebAuthnCredential) -> Arc<dyn PasskeySigner> {
        Arc::new(Offline)
    }
}

#[async_trait]
impl RecoveryBackend for Offline {
    async fn generate_guardian(
        &self,
        _account: Address,
        _identifier: &RecoveryIdentifier,
    ) -> Result<Address, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }

    async fn save_recovery_wallet(
        &self,
        _account: Address,
        _guardian: Address,
        _identifier: &RecoveryIdentifier,
    ) -> Result<RecoveryWalletRecord, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }

    async fn list_recovery_wallets(
        &self,
        _account: Address,
    ) -> Result<Vec<RecoveryWalletRecord>, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }

    async fn delete_recovery_wallet(
        &self,
        _account: Address,
        _record_id: &str,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
}

#[async_trait]
impl WithdrawalSignatureService for Offline {
    async fn request_signature(
        &self,
        _request: &WithdrawalRequest,
    ) -> Result<WithdrawalSignatureResponse, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
}

fn collaborators() -> Collaborators {
    Collaborators {
        signer: Arc::new(Offline),
        passkeys: Arc::new(Offline),
        recovery_backend: Arc::new(Offline),
        withdrawals: Arc::new(Offline),
    }
}

fn config() -> Config {
    let mut config = Config::for_network("gnosis").unwrap();
    config.chain.rpc_url = UNREACHABLE.to_string();
    config.bundler.url = UNREACHABLE.to_string();
    config.contracts.proxy_creation_code = Bytes::from(vec![0x60u8, 0x80, 0x60, 0x40]);
    config.webauthn.signer_proxy_creation_code = Bytes::from(vec![0x61u8, 0x01, 0x23]);
    config.recovery.default_guardian = address!("00000000000000000000000000000000000000d1");
    config.recovery.modules = vec![
        RecoveryModuleConfig {
            address: address!("00000000000000000000000000000000000000e7"),
            grace_period: GracePeriod::Days7,
        },
        RecoveryModuleConfig {
            address: address!("00000000000000000000000000000000000000e3"),
            grace_period: GracePeriod::Minutes3,
        },
    ];
    config
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orchestrator.toml");

    let mut original = config();
    original.paymaster.url = Some("https://paymaster.example".to_string());
    original.paymaster.sponsorship_policy_id = Some("policy-1".to_string());
    original.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.chain.chain_id, 100);
    assert_eq!(loaded.contracts, original.contracts);
    assert_eq!(loaded.webauthn, original.webauthn);
    assert_eq!(loaded.recovery.modules, original.recovery.modules);
    assert_eq!(loaded.paymaster.sponsorship_policy_id.as_deref(), Some("policy-1"));
    assert_eq!(loaded.withdrawal, original.withdrawal);
}

#[test]
fn test_incomplete_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orchestrator.toml");
    std::fs::write(&path, "[chain]\nchain_id = 100\n").unwrap();

    assert!(Config::from_file(&path).is_err());
    assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
}

#[test]
fn test_orchestrator_wires_configuration() {
    let orchestrator = Orchestrator::new(config(), collaborators()).unwrap();

    assert!(orchestrator.context().paymaster.is_none());
    assert_eq!(orchestrator.context().settings.chain_id, 100);
    assert_eq!(
        orchestrator.recovery().module().address(),
        address!("00000000000000000000000000000000000000e7")
    );

    let mut sponsored = config();
    sponsored.paymaster.url = Some(UNREACHABLE.to_string());
    sponsored.recovery.environment = Environment::Development;
    let orchestrator = Orchestrator::new(sponsored, collaborators()).unwrap();

    assert!(orchestrator.context().paymaster.is_some());
    assert_eq!(orchestrator.recovery().module().grace_period(), GracePeriod::Minutes3);
}

#[test]
fn test_orchestrator_rejects_invalid_configuration() {
    let mut missing_module = config();
    missing_module.recovery.environment = Environment::Staging;
    assert!(Orchestrator::new(missing_module, collaborators()).is_err());

    assert!(Orchestrator::new(Config::default(), collaborators()).is_err());
}

#[tokio::test]
async fn test_unreachable_chain_leaves_passkeys_unknown() {
    let orchestrator = Orchestrator::new(config(), collaborators()).unwrap();
    let passkeys = vec![RegisteredPasskey {
        id: "pk-1".into(),
        credential_id: "cred-1".into(),
        rp_id: None,
        name: Some("Laptop".into()),
        public_key: Some(PublicKeyCoordinates::new(U256::from(7u64), U256::from(8u64))),
    }];

    let synced = orchestrator
        .sync_passkeys(address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"), &passkeys)
        .await;

    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].status, PasskeyStatus::Unknown);
}

#[tokio::test]
async fn test_unreachable_chain_fails_recovery_toggle() {
    let orchestrator = Orchestrator::new(config(), collaborators()).unwrap();
    let (events, mut rx) = EventSink::channel();

    let result = orchestrator
        .recovery()
        .toggle_recovery(address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"), true, 1, &events)
        .await;
    drop(events);

    assert!(result.is_err());
    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        kinds.push(event.kind());
    }
    assert_eq!(kinds.last(), Some(&"error"));
}
