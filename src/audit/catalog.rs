//! Vulnerability catalog.
//!
//! A catalog maps a lowercase package key to the vulnerability records that
//! apply to every package whose name contains that key. It is built once,
//! never mutated afterwards, and shared between auditors behind an [`Arc`].
//!
//! # File format
//!
//! ```json
//! {
//!   "lodash": [
//!     {
//!       "id": "CVE-2020-8203",
//!       "severity": "high",
//!       "description": "Prototype pollution in zipObjectDeep",
//!       "cvss": 7.4,
//!       "published": "2020-07-15",
//!       "fixed_in": "4.17.19"
//!     }
//!   ]
//! }
//! ```

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

use crate::model::{Severity, Vulnerability};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CVSS score {cvss} of {id} is outside 0.0-10.0")]
    InvalidCvss { id: String, cvss: f32 },

    #[error("{id} has severity `none`; catalog entries need low, medium, high or critical")]
    MissingSeverity { id: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VulnerabilityCatalog {
    // Sorted so attachment order is deterministic.
    entries: BTreeMap<String, Vec<Vulnerability>>,
}

impl VulnerabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Illustrative seed used when no catalog file is configured.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            "lodash",
            seed(
                "CVE-2020-8203",
                Severity::High,
                "Prototype pollution in zipObjectDeep",
                7.4,
                (2020, 7, 15),
                "4.17.19",
            ),
        );
        catalog.insert(
            "log4j",
            seed(
                "CVE-2021-44228",
                Severity::Critical,
                "Remote code execution through JNDI lookups in log messages",
                10.0,
                (2021, 12, 10),
                "2.15.0",
            ),
        );
        catalog.insert(
            "minimist",
            seed(
                "CVE-2020-7598",
                Severity::Medium,
                "Prototype pollution through crafted arguments",
                5.6,
                (2020, 3, 11),
                "1.2.3",
            ),
        );
        catalog
    }

    /// Process-wide builtin catalog, built on first use.
    pub fn shared_builtin() -> Arc<Self> {
        static BUILTIN: OnceLock<Arc<VulnerabilityCatalog>> = OnceLock::new();
        BUILTIN.get_or_init(|| Arc::new(Self::builtin())).clone()
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, Vec<Vulnerability>> = serde_json::from_str(content)?;
        let mut catalog = Self::new();
        for (key, vulnerabilities) in raw {
            for vuln in vulnerabilities {
                if !(0.0..=10.0).contains(&vuln.cvss) {
                    return Err(CatalogError::InvalidCvss {
                        id: vuln.id,
                        cvss: vuln.cvss,
                    });
                }
                if vuln.severity == Severity::None {
                    return Err(CatalogError::MissingSeverity { id: vuln.id });
                }
                catalog.insert(&key, vuln);
            }
        }
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!(path = %path.display(), keys = catalog.len(), "Loaded vulnerability catalog");
        Ok(catalog)
    }

    /// Adds a record under `key`, lowercased.
    pub fn insert(&mut self, key: &str, vulnerability: Vulnerability) {
        self.entries
            .entry(key.to_lowercase())
            .or_default()
            .push(vulnerability);
    }

    pub fn get(&self, key: &str) -> Option<&[Vulnerability]> {
        self.entries.get(&key.to_lowercase()).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vulnerability])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn seed(
    id: &str,
    severity: Severity,
    description: &str,
    cvss: f32,
    (year, month, day): (i32, u32, u32),
    fixed_in: &str,
) -> Vulnerability {
    Vulnerability {
        id: id.to_string(),
        severity,
        description: description.to_string(),
        cvss,
        published: NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN),
        fixed_in: fixed_in.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_seed() {
        let catalog = VulnerabilityCatalog::builtin();
        assert_eq!(catalog.len(), 3);
        let lodash = catalog.get("lodash").unwrap();
        assert_eq!(lodash[0].severity, Severity::High);
        assert_eq!(lodash[0].published.to_string(), "2020-07-15");
    }

    #[test]
    fn test_shared_builtin_is_single_instance() {
        let a = VulnerabilityCatalog::shared_builtin();
        let b = VulnerabilityCatalog::shared_builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_from_json_lowercases_keys() {
        let json = r#"{
            "Jackson-Databind": [{
                "id": "CVE-2019-12384",
                "severity": "medium",
                "description": "Polymorphic typing gadget",
                "cvss": 5.9,
                "published": "2019-06-24",
                "fixed_in": "2.9.9.1"
            }]
        }"#;
        let catalog = VulnerabilityCatalog::from_json_str(json).unwrap();
        assert!(catalog.get("jackson-databind").is_some());
        assert_eq!(catalog.iter().next().unwrap().0, "jackson-databind");
    }

    #[test]
    fn test_from_json_rejects_bad_cvss() {
        let json = r#"{"x": [{"id": "CVE-1", "severity": "low", "description": "",
            "cvss": 11.0, "published": "2020-01-01", "fixed_in": ""}]}"#;
        let err = VulnerabilityCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCvss { .. }));
    }

    #[test]
    fn test_from_json_rejects_bad_date() {
        let json = r#"{"x": [{"id": "CVE-1", "severity": "low", "description": "",
            "cvss": 1.0, "published": "yesterday", "fixed_in": ""}]}"#;
        assert!(VulnerabilityCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = VulnerabilityCatalog::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
