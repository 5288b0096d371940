//! Go modules.
//!
//! Resolved versions come only from `go list -m all`; `go.mod` is read to
//! decide which modules are direct requirements.

use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use crate::traits::{read_manifest, DependencyAdapter, ParseError};

#[derive(Debug, Default, Clone, Copy)]
pub struct GoAdapter;

impl DependencyAdapter for GoAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn tool_command(&self) -> ToolCommand {
        ToolCommand::new("go", &["list", "-m", "all"])
    }

    fn parse_tool_output(
        &self,
        repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError> {
        let direct: HashSet<String> = match read_manifest(repo, "go.mod") {
            Ok(content) => parse_requires(&content)
                .into_iter()
                .filter(|r| !r.indirect)
                .map(|r| r.module)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not read go.mod, marking all modules transitive");
                HashSet::new()
            }
        };

        for (module, version) in parse_module_list(stdout) {
            let is_direct = direct.contains(module);
            builder.push(module, version, is_direct);
        }
        Ok(())
    }

    fn parse_fallback(&self, repo: &Path, _builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let content = read_manifest(repo, "go.mod")?;
        let declared = parse_requires(&content).len();
        Err(ParseError::ToolRequired(format!(
            "go.mod declares {declared} modules but resolving their versions requires `go list -m all`"
        )))
    }
}

/// A `require` entry from `go.mod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub module: String,
    pub version: String,
    pub indirect: bool,
}

/// Extracts `require` entries in both single-line and block form.
pub fn parse_requires(content: &str) -> Vec<Require> {
    let mut requires = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
            } else if let Some(req) = parse_require_line(trimmed) {
                requires.push(req);
            }
            continue;
        }

        let keyword_rest = trimmed
            .strip_prefix("require")
            .filter(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '('));
        if let Some(rest) = keyword_rest {
            let rest = rest.trim_start();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some(req) = parse_require_line(rest) {
                requires.push(req);
            }
        }
    }

    requires
}

fn parse_require_line(line: &str) -> Option<Require> {
    let indirect = line.contains("// indirect");
    let without_comment = match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    };
    let mut parts = without_comment.split_whitespace();
    let module = parts.next()?;
    let version = parts.next()?;
    Some(Require {
        module: module.to_string(),
        version: version.to_string(),
        indirect,
    })
}

/// Parses `go list -m all` lines into `(module, version)` pairs. The main
/// module is printed without a version and is skipped.
fn parse_module_list(stdout: &str) -> impl Iterator<Item = (&str, &str)> {
    stdout.lines().filter_map(|line| {
        let mut parts = line.split_whitespace();
        let module = parts.next()?;
        let version = parts.next()?;
        if version == "=>" {
            return None;
        }
        Some((module, version))
    })
}
