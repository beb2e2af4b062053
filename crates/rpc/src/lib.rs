use thiserror::Error;

pub mod bundler;
pub mod chain;
pub mod client;
pub mod paymaster;
pub mod types;

pub use bundler::{Bundler, HttpBundler};
pub use chain::{ChainReader, HttpChainReader};
pub use client::JsonRpcClient;
pub use paymaster::{HttpPaymaster, Paymaster};
pub use types::*;

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The request never got an answer: connection, DNS, timeout, 5xx.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl RpcError {
    /// Genuine network failure, as opposed to a definitive answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }

    /// JSON-RPC code, if the remote produced one.
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
