//! Dependency audit pipeline.
//!
//! [`DependencyAuditor`] runs the stages of one repository audit strictly in
//! sequence:
//! 1. **Detection**: pick the ecosystem from manifest presence
//! 2. **Ingestion**: tool output or manifest fallback into a [`TreeBuilder`](super::tree::TreeBuilder)
//! 3. **Matching**: attach catalog records to nodes
//! 4. **Aggregation**: count vulnerable nodes per severity
//! 5. **Reporting**: build the [`CheckResult`](super::report::CheckResult)
//!
//! Each run owns its tree; nothing is shared between runs except the
//! read-only catalog.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use super::adapters;
use super::catalog::{CatalogError, VulnerabilityCatalog};
use super::detect::{self, Ecosystem};
use super::matcher;
use super::report::{self, AuditReport};
use super::scoring;
use super::tool::{SystemToolRunner, ToolRunner};
use crate::config::AuditorConfig;

/// Audits a single repository's dependencies against a vulnerability catalog.
///
/// # Example
///
/// ```ignore
/// use dependency_auditor::audit::DependencyAuditor;
/// use dependency_auditor::config::AuditorConfig;
///
/// let auditor = DependencyAuditor::from_config(AuditorConfig::default())?;
/// let report = auditor.audit(Path::new("./my-service")).await;
/// println!("{}: {}", report.result.score, report.result.message);
/// ```
pub struct DependencyAuditor {
    catalog: Arc<VulnerabilityCatalog>,
    runner: Arc<dyn ToolRunner>,
    config: AuditorConfig,
}

impl DependencyAuditor {
    /// Creates an auditor that runs real tools with default settings.
    pub fn new(catalog: Arc<VulnerabilityCatalog>) -> Self {
        Self {
            catalog,
            runner: Arc::new(SystemToolRunner),
            config: AuditorConfig::default(),
        }
    }

    /// Creates an auditor from `config`, loading `catalog_path` when set and
    /// the shared builtin catalog otherwise.
    pub fn from_config(config: AuditorConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.catalog_path {
            Some(path) => Arc::new(VulnerabilityCatalog::from_path(path)?),
            None => VulnerabilityCatalog::shared_builtin(),
        };
        Ok(Self::new(catalog).with_config(config))
    }

    pub fn with_config(mut self, config: AuditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the subprocess runner.
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &AuditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &VulnerabilityCatalog {
        &self.catalog
    }

    /// Audits `repo`. Failures are reported, never returned: an adapter that
    /// cannot read the project yields a `Fail` result with score 0.
    #[instrument(skip(self), fields(repo = %repo.display()))]
    pub async fn audit(&self, repo: &Path) -> AuditReport {
        let start = Instant::now();

        let ecosystem = detect::detect(repo);
        if ecosystem == Ecosystem::None {
            info!("No dependency manifest found");
            return report::no_manifest();
        }

        let Some(adapter) = adapters::for_ecosystem(ecosystem) else {
            info!(%ecosystem, "Ecosystem detected but not supported");
            return report::unsupported(ecosystem);
        };

        info!(%ecosystem, "Starting dependency audit");
        let (builder, ingestion) = match adapters::collect(
            adapter,
            repo,
            self.runner.as_ref(),
            self.config.max_depth,
            self.config.use_tools,
        )
        .await
        {
            Ok(collected) => collected,
            Err(e) => {
                error!(%ecosystem, error = %e, "Dependency collection failed");
                let mut report = report::failure(ecosystem, &e);
                report.stats.duration_ms = start.elapsed().as_millis() as u64;
                return report;
            }
        };

        let truncated = builder.truncated();
        let mut tree = builder.finish();
        matcher::annotate(&mut tree, &self.catalog);
        scoring::aggregate(&mut tree);

        let mut report = report::assemble(ecosystem, tree, self.config.retain_tree);
        report.stats.ingestion = Some(ingestion);
        report.stats.truncated = truncated;
        report.stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            %ecosystem,
            score = report.result.score,
            status = ?report.result.status,
            duration_ms = report.stats.duration_ms,
            "Dependency audit completed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::adapters::testing::FakeRunner;
    use crate::audit::adapters::Ingestion;
    use crate::audit::report::CheckStatus;

    fn auditor(runner: FakeRunner) -> (DependencyAuditor, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        let auditor = DependencyAuditor::new(VulnerabilityCatalog::shared_builtin())
            .with_runner(runner.clone());
        (auditor, runner)
    }

    #[tokio::test]
    async fn test_unsupported_ecosystem_warns_without_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Gemfile"), "source 'https://rubygems.org'").unwrap();
        let (auditor, runner) = auditor(FakeRunner::failing());

        let report = auditor.audit(dir.path()).await;
        assert_eq!(report.result.status, CheckStatus::Warning);
        assert_eq!(report.ecosystem, Ecosystem::Ruby);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_path_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"").unwrap();
        let (auditor, runner) = auditor(FakeRunner::succeeding("0x v0.1.0\n1log v0.4.20\n"));

        let report = auditor.audit(dir.path()).await;
        assert_eq!(report.result.status, CheckStatus::Pass);
        assert_eq!(report.stats.ingestion, Some(Ingestion::Tool));
        assert_eq!(
            runner.calls.lock().unwrap().as_slice(),
            ["cargo tree --prefix depth --format {p} -e normal"]
        );
    }

    #[tokio::test]
    async fn test_retained_tree_matches_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "minimist-py==0.1\nflask==2.0.1\n",
        )
        .unwrap();
        let (auditor, _) = auditor(FakeRunner::failing());
        let auditor = auditor.with_config(AuditorConfig::default().with_retain_tree(true));

        let report = auditor.audit(dir.path()).await;
        let tree = report.tree.expect("tree retained");
        assert_eq!(tree.total, 2);
        assert_eq!(tree.total, tree.reachable_count());
        assert_eq!(tree.medium, 1);
        assert_eq!(report.result.score, 95);
        assert_eq!(report.stats.ingestion, Some(Ingestion::Fallback));
    }

    #[tokio::test]
    async fn test_from_config_with_missing_catalog() {
        let config = AuditorConfig::default().with_catalog_path("/nonexistent/catalog.json");
        assert!(DependencyAuditor::from_config(config).is_err());
    }
}
