use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to parse content: {0}")]
    InvalidContent(String),
    #[error("No {0} found in repository")]
    MissingManifest(String),
    #[error("{0}")]
    ToolRequired(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Reads one ecosystem's dependency information into a [`TreeBuilder`].
///
/// Implementations insert nodes only through the builder so that the
/// running total stays exact. A failed ingestion leaves the builder in an
/// unspecified state; callers discard it.
pub trait DependencyAdapter: Send + Sync {
    /// Returns the ecosystem this adapter handles.
    fn ecosystem(&self) -> Ecosystem;

    /// The ecosystem's own dependency-listing invocation.
    fn tool_command(&self) -> ToolCommand;

    /// Parses the stdout of a successful [`tool_command`](Self::tool_command) run.
    fn parse_tool_output(
        &self,
        repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError>;

    /// Reads manifests or lockfiles directly when the tool is unavailable.
    fn parse_fallback(&self, repo: &Path, builder: &mut TreeBuilder) -> Result<(), ParseError>;
}

/// Reads a file from the repository, mapping a missing file to
/// [`ParseError::MissingManifest`].
pub(crate) fn read_manifest(repo: &Path, file_name: &str) -> Result<String, ParseError> {
    let path = repo.join(file_name);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ParseError::MissingManifest(file_name.to_string()))
        }
        Err(e) => Err(ParseError::IoError(e)),
    }
}
