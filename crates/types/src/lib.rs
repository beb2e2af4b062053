pub mod address;
pub mod guardian;
pub mod passkey;
pub mod receipt;
pub mod transaction;
pub mod user_operation;

pub use address::{contains_address, parse_address_lenient};
pub use guardian::GuardianStatus;
pub use passkey::{
    Passkey, PasskeyRecord, PasskeyStatus, PublicKeyCoordinates, RegisteredPasskey, Signer,
    WebAuthnCredential,
};
pub use receipt::UserOperationReceipt;
pub use transaction::{Operation, SubTransaction};
pub use user_operation::{GasFees, GasLimits, Sponsorship, UserOperation};

pub use alloy_primitives::{Address, Bytes, B256, U256};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Missing public key")]
    MissingPublicKey,
}

pub type Result<T> = std::result::Result<T, TypesError>;
