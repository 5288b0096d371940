//! Rust crates from `cargo tree` or `Cargo.lock`.

use serde::Deserialize;
use std::path::Path;

use super::{insert_by_depth, DepthEntry};
use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use crate::traits::{read_manifest, DependencyAdapter, ParseError};

#[derive(Debug, Default, Clone, Copy)]
pub struct RustAdapter;

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: Option<String>,
}

impl DependencyAdapter for RustAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn tool_command(&self) -> ToolCommand {
        ToolCommand::new(
            "cargo",
            &["tree", "--prefix", "depth", "--format", "{p}", "-e", "normal"],
        )
    }

    fn parse_tool_output(
        &self,
        _repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError> {
        let entries = parse_depth_lines(stdout)?;
        insert_by_depth(builder, &entries);
        Ok(())
    }

    /// `Cargo.lock` is a flat package list with no record of who requires
    /// what, so every registry or git package is inserted as transitive.
    /// Path and workspace crates have no `source` and are skipped.
    fn parse_fallback(&self, repo: &Path, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let content = read_manifest(repo, "Cargo.lock")?;
        let lock: CargoLock = toml::from_str(&content)?;
        for package in lock.package.iter().filter(|p| p.source.is_some()) {
            builder.push(package.name.as_str(), package.version.as_str(), false);
        }
        Ok(())
    }
}

/// Parses `cargo tree --prefix depth` lines such as `2serde_derive v1.0.188 (proc-macro)`.
/// Depth-0 lines are the workspace's own crates and are dropped.
fn parse_depth_lines(stdout: &str) -> Result<Vec<DepthEntry>, ParseError> {
    let mut entries = Vec::new();
    for line in stdout.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let digits = line.bytes().take_while(u8::is_ascii_digit).count();
        let depth: usize = line[..digits].parse().map_err(|_| {
            ParseError::InvalidContent(format!("cargo tree line without depth prefix: {line}"))
        })?;
        if depth == 0 {
            continue;
        }

        let mut parts = line[digits..].split_whitespace();
        let (Some(name), Some(version)) = (parts.next(), parts.next()) else {
            return Err(ParseError::InvalidContent(format!(
                "malformed cargo tree line: {line}"
            )));
        };
        entries.push(DepthEntry {
            depth,
            name: name.to_string(),
            version: version.trim_start_matches('v').to_string(),
        });
    }
    Ok(entries)
}
