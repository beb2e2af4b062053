use crate::{Result, TypesError};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// P-256 public key as affine coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyCoordinates {
    pub x: U256,
    pub y: U256,
}

impl PublicKeyCoordinates {
    pub fn new(x: U256, y: U256) -> Self {
        Self { x, y }
    }

    /// Parse a persisted public key.
    ///
    /// Accepts `{"x": .., "y": ..}` with `0x`-hex or decimal string (or
    /// integer) coordinates, and the same object serialized into a JSON
    /// string, which older records carry.
    pub fn parse_raw(raw: &Value) -> Result<Self> {
        match raw {
            Value::Object(map) => {
                let x = map
                    .get("x")
                    .ok_or_else(|| TypesError::InvalidPublicKey("missing x coordinate".into()))?;
                let y = map
                    .get("y")
                    .ok_or_else(|| TypesError::InvalidPublicKey("missing y coordinate".into()))?;
                Ok(Self {
                    x: parse_coordinate(x)?,
                    y: parse_coordinate(y)?,
                })
            }
            Value::String(s) => {
                let inner: Value = serde_json::from_str(s)
                    .map_err(|e| TypesError::InvalidPublicKey(format!("not JSON: {}", e)))?;
                if !inner.is_object() {
                    return Err(TypesError::InvalidPublicKey(
                        "stringified key is not an object".into(),
                    ));
                }
                Self::parse_raw(&inner)
            }
            Value::Null => Err(TypesError::MissingPublicKey),
            other => Err(TypesError::InvalidPublicKey(format!(
                "unsupported encoding: {}",
                other
            ))),
        }
    }
}

fn parse_coordinate(value: &Value) -> Result<U256> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(TypesError::InvalidPublicKey("empty coordinate".into()));
            }
            U256::from_str(s).map_err(|e| TypesError::InvalidPublicKey(e.to_string()))
        }
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| TypesError::InvalidPublicKey(format!("bad coordinate {}", n))),
        other => Err(TypesError::InvalidPublicKey(format!(
            "bad coordinate {}",
            other
        ))),
    }
}

/// A passkey credential as created by the platform authenticator.
///
/// Credentials are replaced, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAuthnCredential {
    pub credential_id: String,
    pub public_key: PublicKeyCoordinates,
    pub rp_id: String,
}

/// Owner credential of a smart account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Signer {
    Address { address: Address },
    WebAuthn { public_key: PublicKeyCoordinates },
}

impl From<Address> for Signer {
    fn from(address: Address) -> Self {
        Signer::Address { address }
    }
}

impl From<PublicKeyCoordinates> for Signer {
    fn from(public_key: PublicKeyCoordinates) -> Self {
        Signer::WebAuthn { public_key }
    }
}

/// Raw passkey row as returned by the off-chain user API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyRecord {
    pub id: String,
    pub credential_id: String,
    #[serde(default)]
    pub rp_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public_key: Option<Value>,
}

/// A passkey whose public key has been validated at the persistence boundary.
///
/// `public_key` is `None` when the record carried no key or one that could
/// not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPasskey {
    pub id: String,
    pub credential_id: String,
    pub rp_id: Option<String>,
    pub name: Option<String>,
    pub public_key: Option<PublicKeyCoordinates>,
}

impl RegisteredPasskey {
    pub fn from_record(record: PasskeyRecord) -> Self {
        let public_key = match record.public_key.as_ref() {
            None => None,
            Some(raw) => match PublicKeyCoordinates::parse_raw(raw) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(passkey = %record.id, error = %e, "Discarding undecodable passkey public key");
                    None
                }
            },
        };

        Self {
            id: record.id,
            credential_id: record.credential_id,
            rp_id: record.rp_id,
            name: record.name,
            public_key,
        }
    }
}

/// On-chain status of a registered passkey. Derived on every sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasskeyStatus {
    ActiveOnchain,
    PendingOnchain,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passkey {
    #[serde(flatten)]
    pub registered: RegisteredPasskey,
    pub owner_address: Option<Address>,
    pub status: PasskeyStatus,
}
