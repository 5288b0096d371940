//! Auditor configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audit::tree::DEFAULT_MAX_DEPTH;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by [`DependencyAuditor`](crate::audit::DependencyAuditor)
/// and [`AuditExecutor`](crate::executor::AuditExecutor).
///
/// Every field has a default, so a config file only needs the keys it
/// overrides:
///
/// ```json
/// { "max_depth": 30, "timeout_secs": 120, "catalog_path": "/etc/vulns.json" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// Depth cap for the dependency tree (default: 50)
    pub max_depth: usize,

    /// Keep the annotated tree in the report for deep rendering
    pub retain_tree: bool,

    /// JSON vulnerability catalog; the builtin seed is used when unset
    pub catalog_path: Option<PathBuf>,

    /// Repositories audited at once in batch mode (default: 4)
    pub concurrency: usize,

    /// Per-repository limit in batch mode. The auditor itself never times out.
    pub timeout_secs: Option<u64>,

    /// Invoke ecosystem tools before falling back to manifests
    pub use_tools: bool,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            retain_tree: false,
            catalog_path: None,
            concurrency: 4,
            timeout_secs: None,
            use_tools: true,
        }
    }
}

impl AuditorConfig {
    /// Loads and validates a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_retain_tree(mut self, retain: bool) -> Self {
        self.retain_tree = retain;
        self
    }

    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_tools(mut self, use_tools: bool) -> Self {
        self.use_tools = use_tools;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditorConfig::default();
        assert_eq!(config.max_depth, 50);
        assert!(config.use_tools);
        assert!(!config.retain_tree);
        assert!(config.timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditor.json");
        std::fs::write(&path, r#"{"max_depth": 10, "timeout_secs": 30}"#).unwrap();

        let config = AuditorConfig::from_file(&path).unwrap();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditor.json");
        std::fs::write(&path, r#"{"concurrency": 0}"#).unwrap();

        let err = AuditorConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditor.json");
        std::fs::write(&path, "max_depth = 3").unwrap();

        let err = AuditorConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("auditor.json"));
    }

    #[test]
    fn test_builder_methods() {
        let config = AuditorConfig::default()
            .with_max_depth(5)
            .with_retain_tree(true)
            .with_tools(false)
            .with_timeout(Duration::from_secs(9));
        assert_eq!(config.max_depth, 5);
        assert!(config.retain_tree);
        assert!(!config.use_tools);
        assert_eq!(config.timeout_secs, Some(9));
    }
}
