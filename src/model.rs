use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse vulnerability bucket. Variants are declared in ascending order so
/// the derived `Ord` gives `Critical > High > Medium > Low > None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String, // CVE-2023-XXXX
    pub severity: Severity,
    pub description: String,
    pub cvss: f32,
    pub published: NaiveDate,
    /// Advisory only, never compared against the installed version.
    pub fixed_in: String,
}

/// One node of the dependency tree. Children are owned by their parent, so
/// a package required from two places appears as two distinct nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String, // ecosystem-qualified, e.g. "group:artifact"
    pub version: String,
    pub direct: bool,
    pub vulnerabilities: Vec<Vulnerability>,
    pub children: Vec<Dependency>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>, direct: bool) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            direct,
            vulnerabilities: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Highest severity among the attached vulnerabilities.
    pub fn severity(&self) -> Severity {
        self.vulnerabilities
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(Severity::None)
    }

    pub fn is_vulnerable(&self) -> bool {
        !self.vulnerabilities.is_empty()
    }

    /// Number of nodes below this one, excluding itself.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: Dependency,
    /// Incremented once per inserted node by the tree builder.
    pub total: usize,
    pub vulnerable: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl DependencyTree {
    pub const ROOT_NAME: &'static str = "project";
    pub const ROOT_VERSION: &'static str = "1.0.0";

    pub fn empty() -> Self {
        Self {
            root: Dependency::new(Self::ROOT_NAME, Self::ROOT_VERSION, true),
            total: 0,
            vulnerable: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
        }
    }

    /// Walks the tree and counts every node reachable from the root.
    pub fn reachable_count(&self) -> usize {
        self.root.descendant_count()
    }

    /// Direct children of the synthetic root.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.root.children
    }
}
