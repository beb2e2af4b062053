use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use safe_types::{Signer, WebAuthnCredential};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SignerError {
    /// The user dismissed the passkey ceremony.
    #[error("Signing cancelled")]
    Cancelled,

    #[error("Signer failed: {0}")]
    Failed(String),
}

/// WebAuthn assertion as returned by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyAssertion {
    pub authenticator_data: Bytes,
    pub client_data_json: String,
    /// ASN.1 DER encoded P-256 signature.
    pub signature: Bytes,
}

/// Signature material before it is encoded for the Safe verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSignature {
    WebAuthn(PasskeyAssertion),
    /// 65-byte `r ‖ s ‖ v` signature of an externally owned owner.
    Ecdsa(Bytes),
}

/// Result of a signing ceremony: who signed and what they produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSignature {
    pub signer: Signer,
    pub signature: RawSignature,
}

/// Produces owner signatures over operation hashes.
///
/// `sign` may suspend for as long as the user takes to complete the
/// ceremony. Dismissal must surface as [`SignerError::Cancelled`].
#[async_trait]
pub trait PasskeySigner: Send + Sync {
    /// Owner credential this signer signs for.
    fn signer(&self) -> Signer;

    async fn sign(&self, hash: B256) -> Result<SignerSignature, SignerError>;
}

/// Registers new passkeys.
#[async_trait]
pub trait PasskeyProvider: Send + Sync {
    async fn create_credential(&self, email: &str) -> Result<WebAuthnCredential, SignerError>;

    /// Signer bound to a credential this provider created.
    fn signer_for(&self, credential: &WebAuthnCredential) -> Arc<dyn PasskeySigner>;
}
