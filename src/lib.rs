//! Passkey-owned Safe accounts driven through ERC-4337.
//!
//! The flows live in [`safe_account_abstraction`]; this crate loads their
//! configuration, installs logging and wires the HTTP clients.

pub mod config;
pub mod logging;
pub mod orchestrator;

pub use config::{
    BundlerConfig, ChainConfig, Config, Environment, LogConfig, PaymasterConfig, RecoveryConfig,
};
pub use orchestrator::{Collaborators, Orchestrator};

pub use safe_account_abstraction as account_abstraction;
pub use safe_rpc as rpc;
pub use safe_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
