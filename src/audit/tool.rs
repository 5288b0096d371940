//! External dependency-listing tool invocation.
//!
//! Tools are run read-only with the repository as working directory. A
//! non-zero exit is reported as [`ToolError::NonZeroExit`], which adapters
//! treat as a signal to use their fallback parser. No timeout is applied
//! here; children are spawned with `kill_on_drop` so a caller that drops the
//! future (for example via `tokio::time::timeout`) also terminates the process.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("`{0}` not found in PATH")]
    NotFound(String),

    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` produced non UTF-8 output")]
    InvalidUtf8 { command: String },

    #[error("Failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: &'static str,
    pub args: Vec<&'static str>,
}

impl ToolCommand {
    pub fn new(program: &'static str, args: &[&'static str]) -> Self {
        Self {
            program,
            args: args.to_vec(),
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Stdout of a tool that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs `command` in `cwd`, returning stdout on exit status 0.
    async fn run(&self, command: &ToolCommand, cwd: &Path) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, command: &ToolCommand, cwd: &Path) -> Result<ToolOutput, ToolError> {
        let rendered = command.to_string();
        debug!(command = %rendered, cwd = %cwd.display(), "Invoking dependency tool");

        let output = Command::new(command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ToolError::NotFound(command.program.to_string()),
                _ => ToolError::Io {
                    command: rendered.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                command: rendered,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout =
            String::from_utf8(output.stdout).map_err(|_| ToolError::InvalidUtf8 { command: rendered })?;
        Ok(ToolOutput { stdout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let cmd = ToolCommand::new("npm", &["ls", "--json"]);
        assert_eq!(cmd.to_string(), "npm ls --json");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new("definitely-not-a-real-dependency-tool", &[]);
        let err = SystemToolRunner.run(&cmd, dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_successful_run_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new("sh", &["-c", "echo lodash 4.17.15"]);
        let output = SystemToolRunner.run(&cmd, dir.path()).await.unwrap();
        assert_eq!(output.stdout.trim(), "lodash 4.17.15");
    }

    #[tokio::test]
    async fn test_non_zero_exit_names_command() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new("sh", &["-c", "echo broken >&2; exit 3"]);
        let err = SystemToolRunner.run(&cmd, dir.path()).await.unwrap_err();
        match err {
            ToolError::NonZeroExit {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "sh -c echo broken >&2; exit 3");
                assert_eq!(code, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
