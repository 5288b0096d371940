use crate::audit::detect::{self, Ecosystem};
use crate::audit::pipeline::DependencyAuditor;
use crate::audit::report::{self, AuditReport};
use crate::config::AuditorConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

/// Why a repository in a batch produced no regular report.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Audit timed out after {0:?}")]
    Timeout(Duration),

    #[error("Semaphore error: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),

    #[error("Audit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Audits many repositories concurrently, at most `concurrency` at a time.
pub struct AuditExecutor {
    semaphore: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl AuditExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            timeout: None,
        }
    }

    pub fn from_config(config: &AuditorConfig) -> Self {
        let executor = Self::new(config.concurrency);
        match config.timeout() {
            Some(timeout) => executor.with_timeout(timeout),
            None => executor,
        }
    }

    /// Bounds each repository's audit. A timed-out audit is dropped, which
    /// kills any tool subprocess it was waiting on.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Audits every repository and returns the reports in input order.
    ///
    /// A repository whose audit times out or panics gets a `Fail` report;
    /// the others are unaffected.
    #[instrument(skip(self, auditor, repos), fields(repos = repos.len()))]
    pub async fn audit_all(
        &self,
        auditor: Arc<DependencyAuditor>,
        repos: Vec<PathBuf>,
    ) -> Vec<(PathBuf, AuditReport)> {
        let handles: Vec<_> = repos
            .into_iter()
            .map(|repo| {
                let auditor = auditor.clone();
                let semaphore = self.semaphore.clone();
                let timeout = self.timeout;
                let task_repo = repo.clone();
                let handle =
                    tokio::spawn(async move { run_one(auditor, semaphore, task_repo, timeout).await });
                (repo, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (repo, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(repo = %repo.display(), error = %e, "Audit task did not complete");
                    report::failure(Ecosystem::None, &ExecutorError::from(e))
                }
            };
            results.push((repo, report));
        }

        let failed = results.iter().filter(|(_, r)| r.is_failure()).count();
        info!(total = results.len(), failed, "Batch audit finished");
        results
    }
}

async fn run_one(
    auditor: Arc<DependencyAuditor>,
    semaphore: Arc<Semaphore>,
    repo: PathBuf,
    timeout: Option<Duration>,
) -> AuditReport {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return report::failure(Ecosystem::None, &ExecutorError::from(e)),
    };

    let audit = auditor.audit(&repo);
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, audit).await {
            Ok(report) => report,
            Err(_) => {
                warn!(repo = %repo.display(), ?limit, "Audit timed out");
                report::failure(detect::detect(&repo), &ExecutorError::Timeout(limit))
            }
        },
        None => audit.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::adapters::testing::FakeRunner;
    use crate::audit::catalog::VulnerabilityCatalog;
    use crate::audit::report::CheckStatus;
    use crate::audit::tool::{ToolCommand, ToolError, ToolOutput, ToolRunner};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps before answering and tracks how many calls overlap.
    struct SlowRunner {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowRunner {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolRunner for SlowRunner {
        async fn run(&self, _command: &ToolCommand, _cwd: &Path) -> Result<ToolOutput, ToolError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ToolOutput {
                stdout: String::new(),
            })
        }
    }

    fn cargo_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reports_keep_input_order() {
        let rust = cargo_repo();
        let empty = tempfile::tempdir().unwrap();
        let python = tempfile::tempdir().unwrap();
        std::fs::write(python.path().join("requirements.txt"), "lodash-py==1.0\n").unwrap();

        let auditor = Arc::new(
            DependencyAuditor::new(VulnerabilityCatalog::shared_builtin())
                .with_runner(Arc::new(FakeRunner::failing())),
        );
        let repos = vec![
            rust.path().to_path_buf(),
            empty.path().to_path_buf(),
            python.path().to_path_buf(),
        ];

        let results = AuditExecutor::new(2).audit_all(auditor, repos.clone()).await;
        assert_eq!(results.len(), 3);
        for ((repo, _), expected) in results.iter().zip(&repos) {
            assert_eq!(repo, expected);
        }
        assert_eq!(results[0].1.ecosystem, Ecosystem::Rust);
        assert_eq!(results[0].1.result.status, CheckStatus::Fail);
        assert_eq!(results[1].1.ecosystem, Ecosystem::None);
        assert_eq!(results[1].1.result.score, 100);
        assert_eq!(results[2].1.result.score, 90);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let repos: Vec<_> = (0..6).map(|_| cargo_repo()).collect();
        let runner = Arc::new(SlowRunner::new(Duration::from_millis(30)));
        let auditor = Arc::new(
            DependencyAuditor::new(VulnerabilityCatalog::shared_builtin())
                .with_runner(runner.clone()),
        );

        let paths = repos.iter().map(|d| d.path().to_path_buf()).collect();
        let results = AuditExecutor::new(2).audit_all(auditor, paths).await;

        assert_eq!(results.len(), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert!(results.iter().all(|(_, r)| r.result.status == CheckStatus::Pass));
    }

    #[test]
    fn test_from_config() {
        let config = AuditorConfig::default()
            .with_concurrency(3)
            .with_timeout(Duration::from_secs(60));
        let executor = AuditExecutor::from_config(&config);
        assert_eq!(executor.semaphore.available_permits(), 3);
        assert_eq!(executor.timeout, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_repo() {
        let repo = cargo_repo();
        let auditor = Arc::new(
            DependencyAuditor::new(VulnerabilityCatalog::shared_builtin())
                .with_runner(Arc::new(SlowRunner::new(Duration::from_secs(5)))),
        );

        let executor = AuditExecutor::new(1).with_timeout(Duration::from_millis(50));

        let results = executor
            .audit_all(auditor, vec![repo.path().to_path_buf()])
            .await;
        let report = &results[0].1;
        assert_eq!(report.result.status, CheckStatus::Fail);
        assert_eq!(report.result.score, 0);
        assert_eq!(report.ecosystem, Ecosystem::Rust);
        assert!(report.result.message.contains("timed out"));
    }
}
