//! Check result assembly.
//!
//! [`CheckResult`] is the structure handed to the surrounding health report.
//! The annotated tree can ride along in [`AuditReport`] for tree-style
//! rendering; no formatting happens here.

use serde::{Deserialize, Serialize};

use super::adapters::Ingestion;
use super::detect::Ecosystem;
use super::scoring;
use crate::model::DependencyTree;

pub const CHECK_ID: &str = "dependency-vulnerabilities";
pub const CHECK_NAME: &str = "Dependency Vulnerabilities";
pub const CHECK_CATEGORY: &str = "security";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub status: CheckStatus,
    /// 0 to 100
    pub score: u8,
    pub message: String,
    pub details: Vec<String>,
    pub category: String,
    /// Unix timestamp (seconds) of the check
    pub timestamp: i64,
}

impl CheckResult {
    fn new(status: CheckStatus, score: u8, message: String, details: Vec<String>) -> Self {
        Self {
            id: CHECK_ID.to_string(),
            name: CHECK_NAME.to_string(),
            status,
            score,
            message,
            details,
            category: CHECK_CATEGORY.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Statistics about one audit run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditStats {
    pub duration_ms: u64,
    /// `None` when no adapter ran
    pub ingestion: Option<Ingestion>,
    /// Subtrees dropped by the depth cap
    pub truncated: usize,
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub result: CheckResult,
    pub ecosystem: Ecosystem,
    /// Present only when the auditor is configured to retain it.
    pub tree: Option<DependencyTree>,
    pub stats: AuditStats,
}

impl AuditReport {
    /// Whether a CLI front end should exit non-zero for this report.
    pub fn is_failure(&self) -> bool {
        self.result.status == CheckStatus::Fail
    }
}

/// Report for an aggregated tree.
pub fn assemble(ecosystem: Ecosystem, tree: DependencyTree, retain_tree: bool) -> AuditReport {
    let score = scoring::tree_score(&tree);
    let (status, message) = if tree.vulnerable == 0 {
        (
            CheckStatus::Pass,
            format!("No known vulnerabilities in {} dependencies", tree.total),
        )
    } else {
        (
            CheckStatus::Fail,
            format!(
                "Found {} vulnerable dependencies ({} critical, {} high)",
                tree.vulnerable, tree.critical, tree.high
            ),
        )
    };

    let details = vec![
        format!("Ecosystem: {ecosystem}"),
        format!("Total dependencies: {}", tree.total),
        format!("Vulnerable: {}", tree.vulnerable),
        format!("Critical: {}", tree.critical),
        format!("High: {}", tree.high),
        format!("Medium: {}", tree.medium),
        format!("Low: {}", tree.low),
    ];

    AuditReport {
        result: CheckResult::new(status, score, message, details),
        ecosystem,
        tree: retain_tree.then_some(tree),
        stats: AuditStats::default(),
    }
}

/// Nothing to vet.
pub fn no_manifest() -> AuditReport {
    bare(
        Ecosystem::None,
        CheckStatus::Pass,
        100,
        "No dependency manifest found".to_string(),
    )
}

/// Detected, but no adapter exists for the ecosystem.
pub fn unsupported(ecosystem: Ecosystem) -> AuditReport {
    bare(
        ecosystem,
        CheckStatus::Warning,
        100,
        format!("Dependency auditing is not supported for {ecosystem} projects"),
    )
}

/// The scan could not complete.
pub fn failure(ecosystem: Ecosystem, error: &dyn std::error::Error) -> AuditReport {
    bare(
        ecosystem,
        CheckStatus::Fail,
        0,
        format!("Dependency audit failed: {error}"),
    )
}

fn bare(ecosystem: Ecosystem, status: CheckStatus, score: u8, message: String) -> AuditReport {
    AuditReport {
        result: CheckResult::new(
            status,
            score,
            message,
            vec![format!("Ecosystem: {ecosystem}")],
        ),
        ecosystem,
        tree: None,
        stats: AuditStats::default(),
    }
}
