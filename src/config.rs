//! Configuration loading and validation

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use crate::protocol::registry::{
    ProtocolConfig, DEFAULT_INCENTIVE_V1, DEFAULT_INCENTIVE_V2, DEFAULT_PACKAGE,
    DEFAULT_PRICE_ORACLE, DEFAULT_STORAGE,
};

lazy_static! {
    static ref ENV_VAR_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid env var pattern");
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Where the signing identity comes from
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the seed phrase
    #[serde(default = "default_mnemonic_env")]
    pub mnemonic_env: String,

    /// Account index in the derivation path
    #[serde(default)]
    pub account_index: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            mnemonic_env: default_mnemonic_env(),
            account_index: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Gas budget per transaction, in the native asset's smallest unit
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas_budget: default_gas_budget(),
        }
    }
}

fn default_rpc_endpoint() -> String {
    "https://fullnode.mainnet.sui.io:443".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_mnemonic_env() -> String {
    "NAVI_MNEMONIC".to_string()
}

fn default_gas_budget() -> u64 {
    50_000_000
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("protocol.package", DEFAULT_PACKAGE)?
            .set_default("protocol.storage", DEFAULT_STORAGE)?
            .set_default("protocol.price_oracle", DEFAULT_PRICE_ORACLE)?
            .set_default("protocol.incentive_v1", DEFAULT_INCENTIVE_V1)?
            .set_default("protocol.incentive_v2", DEFAULT_INCENTIVE_V2)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix NAVI_)
            .add_source(
                config::Environment::with_prefix("NAVI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            anyhow::bail!("rpc.endpoint must be an http(s) URL, got {}", mask_url(&self.rpc.endpoint));
        }

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        if self.transaction.gas_budget == 0 {
            anyhow::bail!("transaction.gas_budget must be positive");
        }

        if !ENV_VAR_NAME.is_match(&self.wallet.mnemonic_env) {
            anyhow::bail!(
                "wallet.mnemonic_env is not a valid variable name: {}",
                self.wallet.mnemonic_env
            );
        }

        if self.protocol.pools.is_empty() {
            anyhow::bail!("protocol.pools must list at least one pool");
        }

        self.protocol
            .validate()
            .context("Invalid protocol configuration")?;

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let pools = self
            .protocol
            .pools
            .iter()
            .map(|p| format!("    {} (asset {}, {} decimals)", p.symbol, p.asset_id, p.decimals))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Wallet:
    mnemonic env: {}
    account index: {}
  Transaction:
    gas budget: {}
  Protocol:
    package: {}
    storage: {}
    price oracle: {}
    incentive v1: {}
    incentive v2: {}
  Pools:
{}"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.wallet.mnemonic_env,
            self.wallet.account_index,
            self.transaction.gas_budget,
            self.protocol.package,
            self.protocol.storage,
            self.protocol.price_oracle,
            self.protocol.incentive_v1,
            self.protocol.incentive_v2,
            pools,
        )
    }
}

/// Mask query parameters in URL (may contain API keys)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                timeout_ms: default_timeout_ms(),
            },
            wallet: WalletConfig::default(),
            transaction: TransactionConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.wallet.mnemonic_env, "NAVI_MNEMONIC");
        assert_eq!(config.transaction.gas_budget, 50_000_000);
        assert_eq!(config.protocol.pools.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.rpc.endpoint, default_rpc_endpoint());
        assert_eq!(config.protocol, ProtocolConfig::default());
    }

    #[test]
    fn test_load_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[rpc]
endpoint = "https://rpc.example.com?key=secret"

[wallet]
account_index = 2

[transaction]
gas_budget = 1000

[protocol]
package = "0xabc"

[[protocol.pools]]
symbol = "SUI"
coin_type = "0x2::sui::SUI"
decimals = 9
pool_id = "0x96df0fce3c471489f4debaaa762cf960b3d97820bd1f3f025ff8190730e958c5"
asset_id = 0
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.wallet.account_index, 2);
        assert_eq!(config.transaction.gas_budget, 1000);
        assert_eq!(config.protocol.package.to_string(), format!("0x{:0>64}", "abc"));
        assert_eq!(config.protocol.storage.to_string(), DEFAULT_STORAGE);
        assert_eq!(config.protocol.pools.len(), 1);
        assert!(config.protocol.pools[0].supply_balance_parent_id.is_none());
        assert!(config.masked_display().contains("https://rpc.example.com?***"));
        assert!(!config.masked_display().contains("secret"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.transaction.gas_budget = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.wallet.mnemonic_env = "NOT A NAME".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.endpoint = "ws://localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let duplicate = config.protocol.pools[0].clone();
        config.protocol.pools.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
