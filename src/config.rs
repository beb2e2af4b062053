use std::fs;
use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use safe_account_abstraction::{
    GracePeriod, InclusionPolicy, RecoveryModuleConfig, RetryPolicy, SafeContracts, SafeSettings,
    WebAuthnVerifierConfig,
};
use serde::{Deserialize, Serialize};

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain RPC
    pub chain: ChainConfig,
    /// ERC-4337 bundler
    pub bundler: BundlerConfig,
    /// Gas sponsorship
    pub paymaster: PaymasterConfig,
    /// Safe and 4337 deployments
    pub contracts: SafeContracts,
    /// WebAuthn signer deployments
    pub webauthn: WebAuthnVerifierConfig,
    /// Social recovery
    pub recovery: RecoveryConfig,
    /// Withdrawal-signature polling bounds
    pub withdrawal: RetryPolicy,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    pub url: String,
    /// Receipt polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Give up waiting for inclusion after this many seconds
    pub inclusion_timeout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymasterConfig {
    /// Without a URL operations pay for their own gas.
    pub url: Option<String>,
    pub sponsorship_policy_id: Option<String>,
}

/// Deployment environment. Selects the recovery grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
}

impl Environment {
    pub fn grace_period(&self) -> GracePeriod {
        match self {
            Environment::Production => GracePeriod::Days7,
            Environment::Staging => GracePeriod::Days3,
            Environment::Development => GracePeriod::Minutes3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub environment: Environment,
    /// Guardian toggled on and off by the recovery switch
    pub default_guardian: Address,
    /// Recovery module deployments, one per grace period
    pub modules: Vec<RecoveryModuleConfig>,
}

impl RecoveryConfig {
    /// The module deployment for this environment's grace period.
    pub fn select(&self) -> Result<RecoveryModuleConfig> {
        let grace_period = self.environment.grace_period();
        self.modules
            .iter()
            .find(|m| m.grace_period == grace_period)
            .copied()
            .with_context(|| {
                format!("No recovery module configured for grace period {:?}", grace_period)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Enable JSON logging
    pub json: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            rpc_url: "http://localhost:8545".to_string(),
            request_timeout: 30,
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        let inclusion = InclusionPolicy::default();
        Self {
            url: "http://localhost:4337".to_string(),
            poll_interval_ms: inclusion.poll_interval_ms,
            inclusion_timeout: inclusion.timeout_secs,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl BundlerConfig {
    pub fn inclusion_policy(&self) -> InclusionPolicy {
        InclusionPolicy {
            poll_interval_ms: self.poll_interval_ms,
            timeout_secs: self.inclusion_timeout,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chain.chain_id == 0 {
            anyhow::bail!("chain_id must be greater than 0");
        }
        if self.chain.rpc_url.is_empty() {
            anyhow::bail!("chain rpc_url must be set");
        }
        if self.bundler.url.is_empty() {
            anyhow::bail!("bundler url must be set");
        }
        if self.bundler.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }

        // Without creation code no counterfactual address can be derived
        if self.contracts.proxy_creation_code.is_empty() {
            anyhow::bail!("contracts.proxy_creation_code must be set");
        }
        if self.webauthn.signer_proxy_creation_code.is_empty() {
            anyhow::bail!("webauthn.signer_proxy_creation_code must be set");
        }

        let module = self.recovery.select()?;
        if module.address == Address::ZERO {
            anyhow::bail!("Recovery module address must not be zero");
        }
        if self.recovery.default_guardian == Address::ZERO {
            anyhow::bail!("recovery.default_guardian must be set");
        }

        if self.withdrawal.max_attempts == 0 {
            anyhow::bail!("withdrawal.max_attempts must be greater than 0");
        }

        Ok(())
    }

    /// Get configuration for specific network
    pub fn for_network(network: &str) -> Result<Self> {
        let mut config = Config::default();

        match network.to_lowercase().as_str() {
            "mainnet" | "main" => {
                config.chain.chain_id = 1;
                config.chain.rpc_url = "https://eth.llamarpc.com".to_string();
            }
            "gnosis" | "xdai" => {
                config.chain.chain_id = 100;
                config.chain.rpc_url = "https://rpc.gnosischain.com".to_string();
                // Gnosis has no P-256 precompile
                config.webauthn.precompile_verifier = Address::ZERO;
            }
            "sepolia" => {
                config.chain.chain_id = 11155111;
                config.chain.rpc_url = "https://rpc.sepolia.org".to_string();
                config.recovery.environment = Environment::Staging;
            }
            "local" | "dev" => {
                config.chain.chain_id = 31337;
                config.chain.rpc_url = "http://localhost:8545".to_string();
                config.bundler.poll_interval_ms = 500;
                config.recovery.environment = Environment::Development;
                config.log.level = "debug".to_string();
            }
            _ => anyhow::bail!("Unknown network: {}", network),
        }

        Ok(config)
    }

    /// Chain-level settings handed to every flow.
    pub fn safe_settings(&self) -> SafeSettings {
        SafeSettings {
            chain_id: self.chain.chain_id,
            contracts: self.contracts.clone(),
            webauthn: self.webauthn.clone(),
            sponsorship_policy_id: self.paymaster.sponsorship_policy_id.clone(),
            inclusion: self.bundler.inclusion_policy(),
        }
    }
}
