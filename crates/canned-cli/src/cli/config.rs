use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Custom socket path for daemon communication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Directory holding preferences and the reply log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Serialize config to JSON for passing to daemon
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    /// Deserialize config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_with_socket_path() {
        let json = r#"{"socketPath": "/tmp/test/canned-cli.sock"}"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.socket_path,
            Some(PathBuf::from("/tmp/test/canned-cli.sock"))
        );
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_parse_config_with_data_dir() {
        let json = r#"{
            "socketPath": "/tmp/test.sock",
            "dataDir": "/var/lib/canned"
        }"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.socket_path, Some(PathBuf::from("/tmp/test.sock")));
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/canned")));
    }

    #[test]
    fn test_parse_config_minimal() {
        let json = r#"{}"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert!(config.socket_path.is_none());
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = CliConfig {
            socket_path: Some(PathBuf::from("/tmp/canned.sock")),
            data_dir: None,
        };
        let json = config.to_json().unwrap();
        let parsed = CliConfig::from_json(&json).unwrap();
        assert_eq!(parsed.socket_path, config.socket_path);
    }
}
