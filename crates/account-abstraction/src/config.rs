use alloy_primitives::{address, Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Safe and ERC-4337 contract deployments used to build accounts and operations.
///
/// Defaults are the canonical Safe v1.4.1 / 4337 module v0.3.0 deployments
/// against EntryPoint v0.7. The proxy creation code has no default: it is
/// read from the factory once (`proxyCreationCode()`) and pinned in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeContracts {
    pub entry_point: Address,
    pub safe_singleton: Address,
    pub proxy_factory: Address,
    pub proxy_creation_code: Bytes,
    pub module_setup: Address,
    pub safe_4337_module: Address,
    pub multi_send: Address,
    pub multi_send_call_only: Address,
    pub webauthn_shared_signer: Address,
    pub salt_nonce: U256,
}

impl Default for SafeContracts {
    fn default() -> Self {
        Self {
            entry_point: address!("0000000071727de22e5e9d8baf0edac6f37da032"),
            safe_singleton: address!("29fcb43b46531bca003ddc8fcb67ffe91900c762"),
            proxy_factory: address!("4e1dcf7ad4e460cfd30791ccc4f9c8a4f820ec67"),
            proxy_creation_code: Bytes::new(),
            module_setup: address!("2dd68b007b46fbe91b9a7c3eda5a7a1063cb5b47"),
            safe_4337_module: address!("75cf11467937ce3f2f357ce24ffc3dbf8fd5c226"),
            multi_send: address!("38869bf66a61cf6bdb996a6ae40d5853fd43b526"),
            multi_send_call_only: address!("9641d764fc13c8b624c04430c7356c1c7c8102e2"),
            webauthn_shared_signer: address!("94a4f6affbd8975951142c3999aeab7ecee555c2"),
            salt_nonce: U256::ZERO,
        }
    }
}

/// Deployment of the WebAuthn signer proxies that turn a passkey into a Safe owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAuthnVerifierConfig {
    pub signer_factory: Address,
    pub signer_singleton: Address,
    pub signer_proxy_creation_code: Bytes,
    /// RIP-7212 precompile, zero when the chain has none.
    pub precompile_verifier: Address,
    pub contract_verifier: Address,
}

impl Default for WebAuthnVerifierConfig {
    fn default() -> Self {
        Self {
            signer_factory: address!("1d31f259ee307358a26dfb23eb365939e8641195"),
            signer_singleton: address!("270d7e4a57e6322f336261f3eae2bade72e68d72"),
            signer_proxy_creation_code: Bytes::new(),
            precompile_verifier: address!("0000000000000000000000000000000000000100"),
            contract_verifier: address!("445a0683e494ea0c5af3e83c5159fbe47cf9e765"),
        }
    }
}

impl WebAuthnVerifierConfig {
    /// `uint176(precompile) << 160 | uint160(contractVerifier)`.
    pub fn packed_verifiers(&self) -> U256 {
        (U256::from_be_slice(self.precompile_verifier.as_slice()) << 160)
            | U256::from_be_slice(self.contract_verifier.as_slice())
    }
}

/// How long and how often to poll the bundler for inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionPolicy {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            timeout_secs: 180,
        }
    }
}

impl InclusionPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounds on polling the withdrawal-signature service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_wait_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_wait_secs: 300,
        }
    }
}

impl RetryPolicy {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Recovery delay enforced by a social recovery module deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GracePeriod {
    Minutes3,
    Days3,
    Days7,
    Days14,
}

impl GracePeriod {
    pub fn duration(&self) -> Duration {
        match self {
            GracePeriod::Minutes3 => Duration::from_secs(3 * 60),
            GracePeriod::Days3 => Duration::from_secs(3 * 86_400),
            GracePeriod::Days7 => Duration::from_secs(7 * 86_400),
            GracePeriod::Days14 => Duration::from_secs(14 * 86_400),
        }
    }
}

/// A social recovery module deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryModuleConfig {
    pub address: Address,
    pub grace_period: GracePeriod,
}
