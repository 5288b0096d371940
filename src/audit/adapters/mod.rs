//! Ecosystem adapters.
//!
//! Each adapter implements [`DependencyAdapter`]. [`for_ecosystem`] is the
//! single place an adapter is chosen, and [`collect`] drives the
//! tool-then-fallback sequence shared by all of them:
//! - `go` - `go list -m all`, `go.mod` for direct-ness
//! - `node` - `npm ls --json`, `package-lock.json`
//! - `python` - `pipdeptree --json`, `requirements.txt` / `Pipfile.lock`
//! - `rust` - `cargo tree`, `Cargo.lock`
//! - `java` - `mvn dependency:tree`, `pom.xml` / `build.gradle`

pub mod go;
pub mod java;
pub mod node;
pub mod python;
pub mod rust;

use std::convert::Infallible;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolRunner;
use crate::audit::tree::TreeBuilder;
use crate::traits::{DependencyAdapter, ParseError};

/// Both the tool and the fallback parser failed.
#[derive(Debug, Error)]
#[error("{ecosystem} dependency listing failed ({tool}) and fallback parsing failed: {fallback}")]
pub struct AdapterError {
    pub ecosystem: Ecosystem,
    /// Why the tool path was not usable.
    pub tool: String,
    #[source]
    pub fallback: ParseError,
}

/// Which ingestion path produced the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingestion {
    Tool,
    Fallback,
}

static GO: go::GoAdapter = go::GoAdapter;
static NODE: node::NodeAdapter = node::NodeAdapter;
static PYTHON: python::PythonAdapter = python::PythonAdapter;
static RUST: rust::RustAdapter = rust::RustAdapter;
static JAVA: java::JavaAdapter = java::JavaAdapter;

/// Returns the adapter for `ecosystem`, or `None` when the ecosystem is
/// detected but not audited.
pub fn for_ecosystem(ecosystem: Ecosystem) -> Option<&'static dyn DependencyAdapter> {
    match ecosystem {
        Ecosystem::Go => Some(&GO),
        Ecosystem::NodeJs => Some(&NODE),
        Ecosystem::Python => Some(&PYTHON),
        Ecosystem::Rust => Some(&RUST),
        Ecosystem::Java => Some(&JAVA),
        Ecosystem::Php | Ecosystem::Ruby | Ecosystem::None => None,
    }
}

/// Builds the dependency forest for `repo`.
///
/// The tool path is tried first when `use_tools` is set. If the tool fails
/// or its output cannot be parsed, the partially filled builder is discarded
/// and the fallback parser starts from a fresh one, so nodes are never
/// inserted twice.
pub async fn collect(
    adapter: &dyn DependencyAdapter,
    repo: &Path,
    runner: &dyn ToolRunner,
    max_depth: usize,
    use_tools: bool,
) -> Result<(TreeBuilder, Ingestion), AdapterError> {
    let ecosystem = adapter.ecosystem();

    let tool_failure = if use_tools {
        let command = adapter.tool_command();
        match runner.run(&command, repo).await {
            Ok(output) => {
                let mut builder = TreeBuilder::with_max_depth(max_depth);
                match adapter.parse_tool_output(repo, &output.stdout, &mut builder) {
                    Ok(()) => {
                        info!(%ecosystem, %command, total = builder.total(), "Parsed tool output");
                        return Ok((builder, Ingestion::Tool));
                    }
                    Err(e) => format!("could not parse `{command}` output: {e}"),
                }
            }
            Err(e) => e.to_string(),
        }
    } else {
        "tool invocation disabled".to_string()
    };

    warn!(%ecosystem, reason = %tool_failure, "Falling back to manifest parsing");

    let mut builder = TreeBuilder::with_max_depth(max_depth);
    match adapter.parse_fallback(repo, &mut builder) {
        Ok(()) => {
            info!(%ecosystem, total = builder.total(), "Parsed manifest fallback");
            Ok((builder, Ingestion::Fallback))
        }
        Err(fallback) => Err(AdapterError {
            ecosystem,
            tool: tool_failure,
            fallback,
        }),
    }
}

/// A tree line from depth-annotated tool output (`cargo tree`, `mvn
/// dependency:tree`). Depth 1 is a direct dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DepthEntry {
    pub depth: usize,
    pub name: String,
    pub version: String,
}

/// Inserts depth-ordered entries, nesting each entry under the closest
/// preceding entry with a smaller depth. Jumps of more than one level are
/// treated as a single level.
pub(crate) fn insert_by_depth(builder: &mut TreeBuilder, entries: &[DepthEntry]) {
    let mut pos = 0;
    // Depth-0 entries never match a level and are skipped.
    while pos < entries.len() {
        let before = pos;
        insert_level(builder, entries, &mut pos, 1);
        if pos == before {
            pos += 1;
        }
    }
}

fn insert_level(
    builder: &mut TreeBuilder,
    entries: &[DepthEntry],
    pos: &mut usize,
    depth: usize,
) {
    while let Some(entry) = entries.get(*pos) {
        if entry.depth < depth {
            return;
        }
        builder.push(entry.name.as_str(), entry.version.as_str(), depth == 1);
        *pos += 1;

        let has_children = entries.get(*pos).is_some_and(|next| next.depth > depth);
        if has_children {
            let opened = builder
                .nested(|b| {
                    insert_level(b, entries, pos, depth + 1);
                    Ok::<(), Infallible>(())
                })
                .unwrap_or_else(|never| match never {});
            if !opened {
                while entries.get(*pos).is_some_and(|next| next.depth > depth) {
                    *pos += 1;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRunner;
    use super::*;

    fn entry(depth: usize, name: &str) -> DepthEntry {
        DepthEntry {
            depth,
            name: name.to_string(),
            version: "1.0".to_string(),
        }
    }

    #[test]
    fn test_insert_by_depth() {
        let entries = vec![
            entry(1, "a"),
            entry(2, "a1"),
            entry(3, "a1x"),
            entry(2, "a2"),
            entry(1, "b"),
            entry(3, "b-jump"),
        ];
        let mut builder = TreeBuilder::new();
        insert_by_depth(&mut builder, &entries);
        let tree = builder.finish();

        assert_eq!(tree.total, 6);
        assert_eq!(tree.reachable_count(), 6);
        let a = &tree.root.children[0];
        assert!(a.direct);
        assert_eq!(a.children[0].children[0].name, "a1x");
        assert!(!a.children[1].direct);
        let b = &tree.root.children[1];
        assert_eq!(b.children[0].name, "b-jump");
    }

    #[test]
    fn test_insert_by_depth_respects_cap() {
        let entries: Vec<_> = (1..=10).map(|d| entry(d, &format!("n{d}"))).collect();
        let mut builder = TreeBuilder::with_max_depth(3);
        insert_by_depth(&mut builder, &entries);
        let tree = builder.finish();
        assert_eq!(tree.total, 3);
        assert_eq!(tree.reachable_count(), 3);
    }

    #[test]
    fn test_insert_by_depth_resumes_after_capped_subtree() {
        let entries = vec![
            entry(0, "workspace"),
            entry(1, "a"),
            entry(2, "a1"),
            entry(3, "a1x"),
            entry(4, "a1xy"),
            entry(1, "b"),
            entry(2, "b1"),
        ];
        let mut builder = TreeBuilder::with_max_depth(2);
        insert_by_depth(&mut builder, &entries);
        assert_eq!(builder.truncated(), 1);
        let tree = builder.finish();

        let names: Vec<_> = tree.root.children.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tree.root.children[1].children[0].name, "b1");
        assert_eq!(tree.total, 4);
        assert_eq!(tree.reachable_count(), 4);
    }

    #[test]
    fn test_unsupported_ecosystems() {
        assert!(for_ecosystem(Ecosystem::Php).is_none());
        assert!(for_ecosystem(Ecosystem::Ruby).is_none());
        assert!(for_ecosystem(Ecosystem::None).is_none());
        assert_eq!(
            for_ecosystem(Ecosystem::Java).map(|a| a.ecosystem()),
            Some(Ecosystem::Java)
        );
    }

    #[tokio::test]
    async fn test_collect_skips_tools_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask==2.0.1\n").unwrap();
        let runner = FakeRunner::succeeding("[]");

        let (builder, ingestion) =
            collect(&python::PythonAdapter, dir.path(), &runner, 50, false)
                .await
                .unwrap();

        assert_eq!(ingestion, Ingestion::Fallback);
        assert_eq!(builder.total(), 1);
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collect_falls_back_on_unparseable_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask==2.0.1\n").unwrap();
        let runner = FakeRunner::succeeding("not json");

        let (builder, ingestion) =
            collect(&python::PythonAdapter, dir.path(), &runner, 50, true)
                .await
                .unwrap();

        assert_eq!(ingestion, Ingestion::Fallback);
        assert_eq!(builder.total(), 1);
    }

    #[tokio::test]
    async fn test_collect_reports_both_failures() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::failing();

        let err = collect(&node::NodeAdapter, dir.path(), &runner, 50, true)
            .await
            .unwrap_err();

        assert_eq!(err.ecosystem, Ecosystem::NodeJs);
        let message = err.to_string();
        assert!(message.contains("tool failed"));
        assert!(message.contains("package-lock.json"));
    }
}
