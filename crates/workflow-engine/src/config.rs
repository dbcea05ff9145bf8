//! Engine configuration storage
//!
//! Limits and defaults for the executor and the editor, stored as a small
//! camelCase JSON document.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::defaults;
use crate::error::WorkflowEngineError;

/// Engine-wide limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Node visits allowed in one run before it is failed
    pub max_steps: u32,
    /// Iteration cap for loop nodes that do not set their own
    pub default_max_iterations: u32,
    /// Snapshots kept on each of the undo and redo stacks
    pub history_limit: usize,
    /// Timeout applied to executor calls of nodes that do not set their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_node_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_STEPS,
            default_max_iterations: defaults::LOOP_MAX_ITERATIONS,
            history_limit: defaults::HISTORY_LIMIT,
            default_node_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from disk
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await.map_err(ConfigError::Io)?;

        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to disk
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(ConfigError::Io)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(path, contents).await.map_err(ConfigError::Io)?;

        log::info!("Engine configuration saved to {:?}", path);
        Ok(())
    }

    pub fn default_node_timeout(&self) -> Option<Duration> {
        self.default_node_timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

impl From<ConfigError> for WorkflowEngineError {
    fn from(error: ConfigError) -> Self {
        WorkflowEngineError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("engine.json")).await.unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_steps, 10_000);
        assert_eq!(config.history_limit, 20);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");
        let config = EngineConfig {
            max_steps: 50,
            default_node_timeout_ms: Some(2_000),
            ..Default::default()
        };

        config.save(&path).await.unwrap();
        let loaded = EngineConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.default_node_timeout(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        tokio::fs::write(&path, r#"{"maxSteps": 7}"#).await.unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.default_max_iterations, 100);
    }

    #[tokio::test]
    async fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(matches!(
            EngineConfig::load(&path).await,
            Err(ConfigError::Parse(_))
        ));
    }
}
