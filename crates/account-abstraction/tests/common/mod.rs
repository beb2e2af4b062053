//! In-memory collaborators. Every fake appends to a shared call log so
//! tests can assert ordering across chain, bundler and signer.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use p256::ecdsa::{signature::Signer as _, Signature, SigningKey};
use safe_account_abstraction::{
    InclusionPolicy, PasskeyAssertion, PasskeyProvider, PasskeySigner, RawSignature,
    RecoveryBackend, RecoveryIdentifier, RecoveryWalletRecord, SafeContext, SafeContracts,
    SafeSettings, ServiceError, SignerError, SignerSignature, WebAuthnVerifierConfig,
    WithdrawalRequest, WithdrawalSignatureResponse, WithdrawalSignatureService,
};
use safe_rpc::{Bundler, ChainReader, Paymaster, RpcError};
use safe_types::{
    GasFees, GasLimits, PublicKeyCoordinates, Signer, Sponsorship, UserOperation,
    UserOperationReceipt, WebAuthnCredential,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub const CHAIN_ID: u64 = 100;
pub const PAYMASTER: Address = address!("00000000000000000000000000000000000000fa");

pub fn log_contains(log: &CallLog, entry: &str) -> bool {
    log.lock().unwrap().iter().any(|e| e == entry)
}

pub fn log_position(log: &CallLog, entry: &str) -> Option<usize> {
    log.lock().unwrap().iter().position(|e| e == entry)
}

pub fn settings() -> SafeSettings {
    SafeSettings {
        chain_id: CHAIN_ID,
        contracts: SafeContracts {
            proxy_creation_code: Bytes::from(vec![0x60u8, 0x80, 0x60, 0x40, 0x52]),
            ..Default::default()
        },
        webauthn: WebAuthnVerifierConfig {
            signer_proxy_creation_code: Bytes::from(vec![0x61u8, 0x01, 0x00, 0x3d]),
            ..Default::default()
        },
        sponsorship_policy_id: Some("policy-1".into()),
        inclusion: InclusionPolicy {
            poll_interval_ms: 10,
            timeout_secs: 1,
        },
    }
}

pub fn public_key(seed: u64) -> PublicKeyCoordinates {
    PublicKeyCoordinates::new(U256::from(seed), U256::from(seed * 31 + 7))
}

/// Chain with programmable bytecode and `eth_call` answers keyed by target
/// and selector.
pub struct FakeChain {
    pub log: CallLog,
    code: Mutex<HashMap<Address, Bytes>>,
    calls: Mutex<HashMap<(Address, [u8; 4]), Result<Bytes, RpcError>>>,
    code_error: Mutex<Option<RpcError>>,
}

impl FakeChain {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            code: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            code_error: Mutex::new(None),
        }
    }

    pub fn deploy(&self, address: Address) {
        self.code
            .lock()
            .unwrap()
            .insert(address, Bytes::from(vec![0x60u8, 0x80]));
    }

    pub fn fail_code_lookups(&self, error: RpcError) {
        *self.code_error.lock().unwrap() = Some(error);
    }

    pub fn respond(&self, to: Address, selector: [u8; 4], output: Vec<u8>) {
        self.calls
            .lock()
            .unwrap()
            .insert((to, selector), Ok(output.into()));
    }

    pub fn respond_error(&self, to: Address, selector: [u8; 4], error: RpcError) {
        self.calls.lock().unwrap().insert((to, selector), Err(error));
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn chain_id(&self) -> safe_rpc::Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn get_code(&self, address: Address) -> safe_rpc::Result<Bytes> {
        if let Some(error) = self.code_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> safe_rpc::Result<Bytes> {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        self.log.lock().unwrap().push(format!("call:{}", to));
        self.calls
            .lock()
            .unwrap()
            .get(&(to, selector))
            .cloned()
            .unwrap_or_else(|| Err(RpcError::Rpc {
                code: 3,
                message: "execution reverted".into(),
            }))
    }

    async fn gas_fees(&self) -> safe_rpc::Result<GasFees> {
        Ok(GasFees {
            max_fee_per_gas: U256::from(3_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
        })
    }
}

/// Bundler that includes operations immediately.
pub struct FakeBundler {
    pub log: CallLog,
    pub sent: Mutex<Vec<UserOperation>>,
    pub estimated: Mutex<Vec<UserOperation>>,
    reverting: Mutex<HashSet<Address>>,
    rejecting: Mutex<HashSet<Address>>,
    stalled: Mutex<HashSet<Address>>,
    failing_receipts: Mutex<HashSet<Address>>,
    hashes: Mutex<HashMap<B256, (Address, U256)>>,
}

impl FakeBundler {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            sent: Mutex::new(Vec::new()),
            estimated: Mutex::new(Vec::new()),
            reverting: Mutex::new(HashSet::new()),
            rejecting: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashSet::new()),
            failing_receipts: Mutex::new(HashSet::new()),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Operations from `sender` are included with `success == false`.
    pub fn revert_for(&self, sender: Address) {
        self.reverting.lock().unwrap().insert(sender);
    }

    /// Operations from `sender` are refused at submission.
    pub fn reject_for(&self, sender: Address) {
        self.rejecting.lock().unwrap().insert(sender);
    }

    /// Operations from `sender` are accepted but never included.
    pub fn stall_for(&self, sender: Address) {
        self.stalled.lock().unwrap().insert(sender);
    }

    /// Receipt lookups for `sender` fail with a non-transport error.
    pub fn fail_receipts_for(&self, sender: Address) {
        self.failing_receipts.lock().unwrap().insert(sender);
    }

    pub fn sent_by(&self, sender: Address) -> Vec<UserOperation> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.sender == sender)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn estimate_user_operation_gas(
        &self,
        user_op: &UserOperation,
        _entry_point: Address,
    ) -> safe_rpc::Result<GasLimits> {
        self.estimated.lock().unwrap().push(user_op.clone());
        Ok(GasLimits {
            call_gas_limit: U256::from(120_000u64),
            verification_gas_limit: U256::from(400_000u64),
            pre_verification_gas: U256::from(60_000u64),
        })
    }

    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        _entry_point: Address,
    ) -> safe_rpc::Result<B256> {
        self.log.lock().unwrap().push(format!("send:{}", user_op.sender));
        if self.rejecting.lock().unwrap().contains(&user_op.sender) {
            return Err(RpcError::Rpc {
                code: -32500,
                message: "AA23 reverted".into(),
            });
        }

        let mut preimage = user_op.sender.to_vec();
        preimage.extend_from_slice(&user_op.nonce.to_be_bytes::<32>());
        let hash = keccak256(&preimage);

        self.sent.lock().unwrap().push(user_op.clone());
        self.hashes
            .lock()
            .unwrap()
            .insert(hash, (user_op.sender, user_op.nonce));
        Ok(hash)
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> safe_rpc::Result<Option<UserOperationReceipt>> {
        let Some((sender, nonce)) = self.hashes.lock().unwrap().get(&user_op_hash).copied() else {
            return Ok(None);
        };
        if self.stalled.lock().unwrap().contains(&sender) {
            return Ok(None);
        }
        if self.failing_receipts.lock().unwrap().contains(&sender) {
            return Err(RpcError::Rpc {
                code: -32602,
                message: "invalid user operation hash".into(),
            });
        }
        self.log.lock().unwrap().push(format!("included:{}", sender));

        let success = !self.reverting.lock().unwrap().contains(&sender);
        Ok(Some(UserOperationReceipt {
            user_op_hash,
            sender,
            nonce,
            success,
            actual_gas_cost: U256::from(21_000u64),
            actual_gas_used: U256::from(21_000u64),
            reason: (!success).then(|| "execution reverted".to_string()),
            transaction_hash: Some(B256::repeat_byte(0x77)),
        }))
    }
}

pub struct FakePaymaster {
    pub calls: Mutex<u32>,
}

impl FakePaymaster {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Paymaster for FakePaymaster {
    async fn sponsor_user_operation(
        &self,
        _user_op: &UserOperation,
        _entry_point: Address,
        _policy_id: Option<&str>,
    ) -> safe_rpc::Result<Sponsorship> {
        *self.calls.lock().unwrap() += 1;
        Ok(Sponsorship {
            paymaster: PAYMASTER,
            paymaster_verification_gas_limit: U256::from(50_000u64),
            paymaster_post_op_gas_limit: U256::from(10_000u64),
            paymaster_data: Bytes::from(vec![0xaau8; 8]),
            call_gas_limit: None,
            verification_gas_limit: Some(U256::from(450_000u64)),
            pre_verification_gas: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        })
    }
}

/// Passkey that signs with a fixed P-256 key, or cancels when told to.
pub struct FakeSigner {
    pub log: CallLog,
    pub public_key: PublicKeyCoordinates,
    pub signed: Mutex<Vec<B256>>,
    cancel: bool,
}

impl FakeSigner {
    pub fn new(log: CallLog, public_key: PublicKeyCoordinates) -> Self {
        Self {
            log,
            public_key,
            signed: Mutex::new(Vec::new()),
            cancel: false,
        }
    }

    pub fn cancelling(log: CallLog, public_key: PublicKeyCoordinates) -> Self {
        Self {
            cancel: true,
            ..Self::new(log, public_key)
        }
    }
}

#[async_trait]
impl PasskeySigner for FakeSigner {
    fn signer(&self) -> Signer {
        Signer::WebAuthn {
            public_key: self.public_key,
        }
    }

    async fn sign(&self, hash: B256) -> Result<SignerSignature, SignerError> {
        self.log.lock().unwrap().push("sign".to_string());
        if self.cancel {
            return Err(SignerError::Cancelled);
        }
        self.signed.lock().unwrap().push(hash);

        let key = SigningKey::from_slice(&[0x42u8; 32])
            .map_err(|e| SignerError::Failed(e.to_string()))?;
        let signature: Signature = key.sign(hash.as_slice());
        Ok(SignerSignature {
            signer: self.signer(),
            signature: RawSignature::WebAuthn(PasskeyAssertion {
                authenticator_data: Bytes::from(vec![0x49u8; 37]),
                client_data_json: format!(
                    r#"{{"type":"webauthn.get","challenge":"{}","origin":"https://app.example.com","crossOrigin":false}}"#,
                    hash
                ),
                signature: Bytes::from(signature.to_der().as_bytes().to_vec()),
            }),
        })
    }
}

pub struct FakeProvider {
    pub log: CallLog,
    pub public_key: PublicKeyCoordinates,
}

#[async_trait]
impl PasskeyProvider for FakeProvider {
    async fn create_credential(&self, email: &str) -> Result<WebAuthnCredential, SignerError> {
        self.log.lock().unwrap().push(format!("create_credential:{}", email));
        Ok(WebAuthnCredential {
            credential_id: "cred-1".into(),
            public_key: self.public_key,
            rp_id: "app.example.com".into(),
        })
    }

    fn signer_for(&self, credential: &WebAuthnCredential) -> Arc<dyn PasskeySigner> {
        Arc::new(FakeSigner::new(self.log.clone(), credential.public_key))
    }
}

pub struct FakeRecoveryBackend {
    pub guardian: Address,
    pub records: Mutex<Vec<RecoveryWalletRecord>>,
    pub fail_writes: bool,
}

impl FakeRecoveryBackend {
    pub fn new(guardian: Address) -> Self {
        Self {
            guardian,
            records: Mutex::new(Vec::new()),
            fail_writes: false,
        }
    }
}

#[async_trait]
impl RecoveryBackend for FakeRecoveryBackend {
    async fn generate_guardian(
        &self,
        _account: Address,
        _identifier: &RecoveryIdentifier,
    ) -> Result<Address, ServiceError> {
        Ok(self.guardian)
    }

    async fn save_recovery_wallet(
        &self,
        _account: Address,
        guardian: Address,
        identifier: &RecoveryIdentifier,
    ) -> Result<RecoveryWalletRecord, ServiceError> {
        if self.fail_writes {
            return Err(ServiceError::Unavailable("backend down".into()));
        }
        let mut records = self.records.lock().unwrap();
        let record = RecoveryWalletRecord {
            id: format!("rw-{}", records.len() + 1),
            guardian_address: guardian.to_string(),
            identifier: identifier.clone(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list_recovery_wallets(
        &self,
        _account: Address,
    ) -> Result<Vec<RecoveryWalletRecord>, ServiceError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn delete_recovery_wallet(
        &self,
        _account: Address,
        record_id: &str,
    ) -> Result<(), ServiceError> {
        if self.fail_writes {
            return Err(ServiceError::Unavailable("backend down".into()));
        }
        self.records.lock().unwrap().retain(|r| r.id != record_id);
        Ok(())
    }
}

/// Replays a scripted sequence of responses.
pub struct ScriptedWithdrawalService {
    responses: Mutex<VecDeque<WithdrawalSignatureResponse>>,
    pub requests: Mutex<u32>,
}

impl ScriptedWithdrawalService {
    pub fn new(responses: Vec<WithdrawalSignatureResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(0),
        }
    }
}

#[async_trait]
impl WithdrawalSignatureService for ScriptedWithdrawalService {
    async fn request_signature(
        &self,
        _request: &WithdrawalRequest,
    ) -> Result<WithdrawalSignatureResponse, ServiceError> {
        *self.requests.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ServiceError::Unavailable("script exhausted".into()))
    }
}

/// A context wired to fresh fakes that share one call log.
pub struct Harness {
    pub log: CallLog,
    pub chain: Arc<FakeChain>,
    pub bundler: Arc<FakeBundler>,
    pub paymaster: Arc<FakePaymaster>,
    pub signer: Arc<FakeSigner>,
    pub ctx: SafeContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_signer(|log| FakeSigner::new(log, public_key(1)))
    }

    pub fn with_signer(make: impl FnOnce(CallLog) -> FakeSigner) -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let chain = Arc::new(FakeChain::new(log.clone()));
        let bundler = Arc::new(FakeBundler::new(log.clone()));
        let paymaster = Arc::new(FakePaymaster::new());
        let signer = Arc::new(make(log.clone()));

        let ctx = SafeContext::new(chain.clone(), bundler.clone(), signer.clone(), settings())
            .with_paymaster(paymaster.clone());

        Self {
            log,
            chain,
            bundler,
            paymaster,
            signer,
            ctx,
        }
    }

    /// Mark `account` deployed with entry point nonce `nonce`.
    pub fn deployed_account(&self, account: Address, nonce: u64) {
        use alloy_sol_types::{SolCall, SolValue};
        use safe_account_abstraction::contracts::IEntryPoint;

        self.chain.deploy(account);
        self.chain.respond(
            self.ctx.contracts().entry_point,
            IEntryPoint::getNonceCall::SELECTOR,
            (U256::from(nonce),).abi_encode_params(),
        );
    }
}
