//! Client configuration
//!
//! Loaded once from TOML or JSON, optionally overlaid with environment
//! variables (`OPERATOR_ID`, `OPERATOR_KEY`, `LEDGER_NETWORK`, also read from
//! `.env`), validated, then handed to `Client::from_config`. Nothing else in
//! the crate reads files or the environment.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::hbar::Hbar;
use crate::node_manager::NodeBackoffConfig;
use crate::status::StatusPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Top-level client configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Preset network name: `mainnet`, `testnet`, `previewnet` or `local`.
    #[serde(default)]
    pub network: Option<String>,

    /// Explicit node list; takes precedence over `network`.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub mirror_network: Vec<String>,

    /// Ledger used for checksums when `nodes` is explicit.
    #[serde(default)]
    pub ledger_id: Option<String>,

    #[serde(default)]
    pub operator: Option<OperatorConfig>,

    #[serde(default)]
    pub settings: ClientSettings,

    #[serde(default)]
    pub node_backoff: NodeBackoffConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub account_id: String,
    pub address: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub account_id: String,
    pub private_key: String,
}

impl std::fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

/// Execution defaults. Replaceable at runtime through `Client::update_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_min_backoff", with = "duration_ms")]
    pub min_backoff: Duration,

    #[serde(default = "default_max_backoff", with = "duration_ms")]
    pub max_backoff: Duration,

    /// Total time budget for one execution.
    #[serde(default = "default_request_timeout", with = "duration_ms")]
    pub request_timeout: Duration,

    /// Deadline of a single network call.
    #[serde(default = "default_grpc_deadline", with = "duration_ms")]
    pub grpc_deadline: Duration,

    #[serde(default = "default_max_nodes_per_transaction")]
    pub max_nodes_per_transaction: usize,

    #[serde(default = "default_max_transaction_fee")]
    pub default_max_transaction_fee: Hbar,

    #[serde(default = "default_valid_duration", with = "duration_ms")]
    pub default_valid_duration: Duration,

    #[serde(default)]
    pub auto_validate_checksums: bool,

    /// Fraction of each retry delay randomized (0.0 to 1.0).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    #[serde(default)]
    pub status_policy: StatusPolicy,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_min_backoff() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(8)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_grpc_deadline() -> Duration {
    Duration::from_secs(10)
}

fn default_max_nodes_per_transaction() -> usize {
    3
}

fn default_max_transaction_fee() -> Hbar {
    Hbar::new(2)
}

fn default_valid_duration() -> Duration {
    Duration::from_secs(120)
}

fn default_jitter_factor() -> f64 {
    0.2
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff: default_min_backoff(),
            max_backoff: default_max_backoff(),
            request_timeout: default_request_timeout(),
            grpc_deadline: default_grpc_deadline(),
            max_nodes_per_transaction: default_max_nodes_per_transaction(),
            default_max_transaction_fee: default_max_transaction_fee(),
            default_valid_duration: default_valid_duration(),
            auto_validate_checksums: false,
            jitter_factor: default_jitter_factor(),
            status_policy: StatusPolicy::default(),
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation("max_attempts must be > 0".to_string()));
        }
        if self.min_backoff > self.max_backoff {
            return Err(ConfigError::Validation(format!(
                "min_backoff ({:?}) exceeds max_backoff ({:?})",
                self.min_backoff, self.max_backoff
            )));
        }
        if self.request_timeout.is_zero() || self.grpc_deadline.is_zero() {
            return Err(ConfigError::Validation(
                "request_timeout and grpc_deadline must be non-zero".to_string(),
            ));
        }
        if self.max_nodes_per_transaction == 0 {
            return Err(ConfigError::Validation(
                "max_nodes_per_transaction must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::Validation(
                "jitter_factor must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(format!("failed to parse TOML: {e}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read config file {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read config file {}: {e}", path.display())))?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(format!("failed to parse JSON: {e}")))
    }

    /// Load by file extension, apply environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
        .with_context(|| format!("loading client config from {}", path.display()))?;

        let config = config.with_env_overrides();
        config.validate().context("validating client config")?;
        Ok(config)
    }

    /// Overlay `OPERATOR_ID`, `OPERATOR_KEY` and `LEDGER_NETWORK` from the
    /// process environment (and `.env`, if present).
    pub fn with_env_overrides(self) -> Self {
        let _ = dotenvy::dotenv();
        self.with_overrides(|name| std::env::var(name).ok())
    }

    pub(crate) fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(network) = var("LEDGER_NETWORK") {
            self.network = Some(network);
        }

        match (var("OPERATOR_ID"), var("OPERATOR_KEY")) {
            (Some(account_id), Some(private_key)) => {
                self.operator = Some(OperatorConfig {
                    account_id,
                    private_key,
                });
            }
            (Some(account_id), None) => {
                if let Some(operator) = self.operator.as_mut() {
                    operator.account_id = account_id;
                }
            }
            (None, Some(private_key)) => {
                if let Some(operator) = self.operator.as_mut() {
                    operator.private_key = private_key;
                }
            }
            (None, None) => {}
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;

        if self.node_backoff.min_backoff > self.node_backoff.max_backoff {
            return Err(ConfigError::Validation(
                "node_backoff.min_backoff exceeds node_backoff.max_backoff".to_string(),
            ));
        }

        if self.nodes.is_empty() {
            match self.network.as_deref() {
                None => {
                    return Err(ConfigError::Validation(
                        "either `network` or `nodes` must be configured".to_string(),
                    ))
                }
                Some(name) if crate::network::Network::for_name(name).is_none() => {
                    return Err(ConfigError::Validation(format!("unknown network `{name}`")))
                }
                Some(_) => {}
            }
        }

        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            node.account_id
                .parse::<crate::entity::AccountId>()
                .map_err(|e| ConfigError::Validation(format!("node account id: {e}")))?;
            if !seen.insert(&node.account_id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate node account id {}",
                    node.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let settings = ClientSettings::default();
        assert_eq!(settings.max_attempts, 10);
        assert_eq!(settings.min_backoff, Duration::from_millis(250));
        assert_eq!(settings.max_backoff, Duration::from_secs(8));
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
        assert_eq!(settings.default_max_transaction_fee, Hbar::new(2));
        assert!(!settings.auto_validate_checksums);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_toml_with_partial_settings() {
        let config = ClientConfig::from_toml_str(
            r#"
            network = "testnet"

            [settings]
            max_attempts = 4
            min_backoff = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.max_attempts, 4);
        assert_eq!(config.settings.min_backoff, Duration::from_millis(100));
        assert_eq!(config.settings.max_backoff, Duration::from_secs(8));
        assert_eq!(config.node_backoff.min_backoff, Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_inverted_backoff() {
        let mut config = ClientConfig {
            network: Some("local".to_string()),
            ..Default::default()
        };
        config.settings.min_backoff = Duration::from_secs(10);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_requires_network() {
        assert!(ClientConfig::default().validate().is_err());

        let config = ClientConfig {
            network: Some("moonnet".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            nodes: vec![
                NodeConfig {
                    account_id: "0.0.3".to_string(),
                    address: "a:1".to_string(),
                },
                NodeConfig {
                    account_id: "0.0.3".to_string(),
                    address: "b:1".to_string(),
                },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEDGER_NETWORK", "previewnet"),
            ("OPERATOR_ID", "0.0.1001"),
            ("OPERATOR_KEY", "ed25519:abcd"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.network.as_deref(), Some("previewnet"));
        let operator = config.operator.unwrap();
        assert_eq!(operator.account_id, "0.0.1001");
        assert_eq!(operator.private_key, "ed25519:abcd");
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"nodes": [{{"account_id": "0.0.3", "address": "127.0.0.1:50211"}}], "settings": {{"request_timeout": 5000}}}}"#
        )
        .unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.settings.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ClientConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
