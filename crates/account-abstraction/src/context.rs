use std::sync::Arc;

use safe_rpc::{Bundler, ChainReader, Paymaster};
use serde::{Deserialize, Serialize};

use crate::config::{InclusionPolicy, SafeContracts, WebAuthnVerifierConfig};
use crate::signer::PasskeySigner;

/// Chain-level settings shared by every flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeSettings {
    pub chain_id: u64,
    pub contracts: SafeContracts,
    pub webauthn: WebAuthnVerifierConfig,
    pub sponsorship_policy_id: Option<String>,
    pub inclusion: InclusionPolicy,
}

/// Collaborators a flow runs against.
///
/// Built once at startup and cloned into each flow. Holds no per-account
/// state: nonces are always re-read from the chain.
#[derive(Clone)]
pub struct SafeContext {
    pub chain: Arc<dyn ChainReader>,
    pub bundler: Arc<dyn Bundler>,
    /// `None` means operations pay for their own gas.
    pub paymaster: Option<Arc<dyn Paymaster>>,
    pub signer: Arc<dyn PasskeySigner>,
    pub settings: SafeSettings,
}

impl SafeContext {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        bundler: Arc<dyn Bundler>,
        signer: Arc<dyn PasskeySigner>,
        settings: SafeSettings,
    ) -> Self {
        Self {
            chain,
            bundler,
            paymaster: None,
            signer,
            settings,
        }
    }

    pub fn with_paymaster(mut self, paymaster: Arc<dyn Paymaster>) -> Self {
        self.paymaster = Some(paymaster);
        self
    }

    /// Same collaborators, another passkey.
    pub fn with_signer(&self, signer: Arc<dyn PasskeySigner>) -> Self {
        Self {
            signer,
            ..self.clone()
        }
    }

    pub fn contracts(&self) -> &SafeContracts {
        &self.settings.contracts
    }

    pub fn webauthn(&self) -> &WebAuthnVerifierConfig {
        &self.settings.webauthn
    }
}

impl std::fmt::Debug for SafeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeContext")
            .field("settings", &self.settings)
            .field("sponsored", &self.paymaster.is_some())
            .finish()
    }
}
