//! Encoding of owner signatures into the layout the Safe 4337 module verifies:
//!
//! ```text
//! validAfter (6) ‖ validUntil (6) ‖ static parts (65 each, sorted by signer) ‖ dynamic parts
//! ```

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use p256::ecdsa::Signature as P256Signature;
use safe_types::Signer;

use crate::account::verifier_address;
use crate::config::{SafeContracts, WebAuthnVerifierConfig};
use crate::signer::{PasskeyAssertion, RawSignature, SignerSignature};
use crate::{AccountError, Result};

/// Operations are signed without a validity window.
pub const VALID_AFTER: u64 = 0;
pub const VALID_UNTIL: u64 = 0;

const STATIC_PART_LEN: usize = 65;

/// One owner's contribution to a Safe signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignaturePart {
    /// Fixed 65-byte signature: ECDSA or approved hash.
    Static { signer: Address, data: [u8; 65] },
    /// EIP-1271 signature verified by the owner contract.
    Contract { signer: Address, data: Bytes },
}

impl SignaturePart {
    fn signer(&self) -> Address {
        match self {
            SignaturePart::Static { signer, .. } | SignaturePart::Contract { signer, .. } => {
                *signer
            }
        }
    }
}

/// Assemble signature parts into the module's signature blob.
pub fn build_safe_signature(
    mut parts: Vec<SignaturePart>,
    valid_after: u64,
    valid_until: u64,
) -> Bytes {
    parts.sort_by_key(SignaturePart::signer);

    let mut static_section = Vec::with_capacity(parts.len() * STATIC_PART_LEN);
    let mut dynamic_section = Vec::new();
    let dynamic_base = parts.len() * STATIC_PART_LEN;

    for part in &parts {
        match part {
            SignaturePart::Static { data, .. } => static_section.extend_from_slice(data),
            SignaturePart::Contract { signer, data } => {
                let offset = dynamic_base + dynamic_section.len();
                static_section.extend_from_slice(signer.into_word().as_slice());
                static_section.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());
                static_section.push(0);

                dynamic_section.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
                dynamic_section.extend_from_slice(data);
            }
        }
    }

    let mut out = Vec::with_capacity(12 + static_section.len() + dynamic_section.len());
    out.extend_from_slice(&uint48_bytes(valid_after));
    out.extend_from_slice(&uint48_bytes(valid_until));
    out.extend_from_slice(&static_section);
    out.extend_from_slice(&dynamic_section);
    out.into()
}

fn uint48_bytes(value: u64) -> [u8; 6] {
    let full = value.to_be_bytes();
    let mut out = [0u8; 6];
    out.copy_from_slice(&full[2..]);
    out
}

/// Owner address that verifies a passkey signature.
///
/// Until the init operation swaps it out, the first passkey of a new account
/// is registered through the shared WebAuthn signer.
pub fn passkey_owner(
    signer: &Signer,
    is_init: bool,
    contracts: &SafeContracts,
    webauthn: &WebAuthnVerifierConfig,
) -> Result<Address> {
    match signer {
        Signer::Address { address } => Ok(*address),
        Signer::WebAuthn { .. } if is_init => Ok(contracts.webauthn_shared_signer),
        Signer::WebAuthn { public_key } => verifier_address(public_key, webauthn),
    }
}

/// Encode a signing result for the Safe verifier.
///
/// `is_init` must be set for operations with nonce zero: the signing owner
/// and therefore the encoded layout differ.
pub fn format_signature(
    signature: &SignerSignature,
    is_init: bool,
    contracts: &SafeContracts,
    webauthn: &WebAuthnVerifierConfig,
) -> Result<Bytes> {
    let owner = passkey_owner(&signature.signer, is_init, contracts, webauthn)?;

    let part = match &signature.signature {
        RawSignature::WebAuthn(assertion) => SignaturePart::Contract {
            signer: owner,
            data: encode_webauthn_signature(assertion)?,
        },
        RawSignature::Ecdsa(bytes) => {
            let data: [u8; 65] = bytes.as_ref().try_into().map_err(|_| {
                AccountError::Signature(format!(
                    "expected 65-byte ECDSA signature, got {}",
                    bytes.len()
                ))
            })?;
            SignaturePart::Static { signer: owner, data }
        }
    };

    Ok(build_safe_signature(vec![part], VALID_AFTER, VALID_UNTIL))
}

/// `abi.encode(authenticatorData, clientDataFields, uint256[2] [r, s])`.
pub fn encode_webauthn_signature(assertion: &PasskeyAssertion) -> Result<Bytes> {
    let (r, s) = parse_der_signature(&assertion.signature)?;
    let fields = client_data_fields(&assertion.client_data_json)?;

    Ok((assertion.authenticator_data.clone(), fields, [r, s])
        .abi_encode_params()
        .into())
}

/// Split a DER P-256 signature into `(r, s)` with `s` in the lower half of
/// the curve order, as the on-chain verifier rejects malleable signatures.
pub fn parse_der_signature(der: &[u8]) -> Result<(U256, U256)> {
    let signature = P256Signature::from_der(der)
        .map_err(|e| AccountError::Signature(format!("invalid DER signature: {}", e)))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    let (r, s) = signature.split_bytes();
    Ok((U256::from_be_slice(&r), U256::from_be_slice(&s)))
}

/// Client data JSON fields following the challenge, without the closing brace.
///
/// The verifier rebuilds `{"type":"webauthn.get","challenge":"<hash>",<fields>}`
/// itself, so only the trailing fields travel on chain.
pub fn client_data_fields(client_data_json: &str) -> Result<String> {
    const CHALLENGE: &str = "\"challenge\":\"";

    let start = client_data_json
        .find(CHALLENGE)
        .ok_or_else(|| AccountError::Signature("client data has no challenge".into()))?;
    let after_challenge = &client_data_json[start + CHALLENGE.len()..];
    let end = after_challenge
        .find('"')
        .ok_or_else(|| AccountError::Signature("unterminated challenge in client data".into()))?;

    let rest = after_challenge[end + 1..].trim_end();
    let rest = rest
        .strip_suffix('}')
        .ok_or_else(|| AccountError::Signature("client data is not a JSON object".into()))?;

    Ok(rest.strip_prefix(',').unwrap_or(rest).to_string())
}

/// Signature meaning "`owner` approved this hash on chain via `approveHash`".
///
/// `r = owner`, `s = 0`, `v = 1`.
pub fn approved_hash_signature(owner: Address) -> Bytes {
    let mut data = [0u8; 65];
    data[..32].copy_from_slice(owner.into_word().as_slice());
    data[64] = 1;
    build_safe_signature(
        vec![SignaturePart::Static { signer: owner, data }],
        VALID_AFTER,
        VALID_UNTIL,
    )
}

/// Placeholder with the size and shape of a real signature from `owner`,
/// for gas estimation and sponsorship before the user signs.
pub fn dummy_signature(signer: &Signer, owner: Address) -> Bytes {
    let part = match signer {
        Signer::Address { .. } => {
            let mut data = [0xffu8; 65];
            data[64] = 0x1f;
            SignaturePart::Static { signer: owner, data }
        }
        Signer::WebAuthn { .. } => {
            let authenticator_data = Bytes::from(vec![0xffu8; 37]);
            let fields = String::from("\"origin\":\"https://safe.global\",\"padding\":\"This pads the clientDataJSON so that we can leave room for additional implementation specific fields for a more accurate 'preVerificationGas' estimate.\"");
            let rs = [U256::MAX, U256::MAX];
            SignaturePart::Contract {
                signer: owner,
                data: (authenticator_data, fields, rs).abi_encode_params().into(),
            }
        }
    };
    build_safe_signature(vec![part], VALID_AFTER, VALID_UNTIL)
}
