use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use land_wallet::contract::DEFAULT_CONTRACT_ADDRESS;
use land_wallet::rpc::RpcConfig;
use serde::{Deserialize, Serialize};

/// Settings for the command line client, usually read from a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// JSON-RPC endpoint of the node holding the unlocked accounts
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_contract_address")]
    pub contract_address: Address,
    /// ABI file to bind instead of the embedded one
    #[serde(default)]
    pub abi_path: Option<PathBuf>,
    /// Base URL of the service recording connected addresses
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_contract_address() -> Address {
    DEFAULT_CONTRACT_ADDRESS
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: default_contract_address(),
            abi_path: None,
            backend_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Reads `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rpc(&self) -> RpcConfig {
        RpcConfig::new(self.rpc_url.clone())
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_request_timeout(self.request_timeout())
    }

    /// Contents of the configured ABI file, if any
    pub fn abi_json(&self) -> Result<Option<String>> {
        self.abi_path
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read ABI file: {}", path.display()))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CliConfig::load(None).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.rpc().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("land.toml");
        std::fs::write(
            &path,
            r#"
rpc_url = "http://localhost:7545"
backend_url = "http://localhost:3000"
poll_interval_ms = 250
"#,
        )
        .unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.rpc_url, "http://localhost:7545");
        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.abi_path, None);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "contract_address = \"not an address\"").unwrap();

        let err = CliConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_abi_file_is_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("abi.json");
        std::fs::write(&path, "[]").unwrap();

        let config = CliConfig {
            abi_path: Some(path),
            ..CliConfig::default()
        };
        assert_eq!(config.abi_json().unwrap().as_deref(), Some("[]"));
        assert_eq!(CliConfig::default().abi_json().unwrap(), None);
    }
}
