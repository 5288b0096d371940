//! Python packages from `pipdeptree --json`, `requirements.txt` or
//! `Pipfile.lock`.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use crate::traits::{read_manifest, DependencyAdapter, ParseError};

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAdapter;

#[derive(Debug, Deserialize)]
struct PipEntry {
    package: PipPackage,
    #[serde(default)]
    dependencies: Vec<PipPackage>,
}

#[derive(Debug, Deserialize)]
struct PipPackage {
    key: String,
    package_name: String,
    #[serde(default)]
    installed_version: Option<String>,
}

impl PipPackage {
    fn version(&self) -> &str {
        self.installed_version.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
struct PipfileLock {
    #[serde(default)]
    default: BTreeMap<String, PipfileLockEntry>,
}

#[derive(Debug, Deserialize)]
struct PipfileLockEntry {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pipfile {
    #[serde(default)]
    packages: toml::Table,
}

impl DependencyAdapter for PythonAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn tool_command(&self) -> ToolCommand {
        ToolCommand::new("pipdeptree", &["--json"])
    }

    fn parse_tool_output(
        &self,
        _repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError> {
        let entries: Vec<PipEntry> = serde_json::from_str(stdout)?;
        let by_key: HashMap<&str, &PipEntry> = entries
            .iter()
            .map(|e| (e.package.key.as_str(), e))
            .collect();
        let required: HashSet<&str> = entries
            .iter()
            .flat_map(|e| e.dependencies.iter().map(|d| d.key.as_str()))
            .collect();

        let mut roots: Vec<&PipEntry> = entries
            .iter()
            .filter(|e| !required.contains(e.package.key.as_str()))
            .collect();
        if roots.is_empty() {
            // Every package sits on a cycle; treat them all as top level.
            roots = entries.iter().collect();
        }

        let mut path = Vec::new();
        for entry in roots {
            builder.push(
                entry.package.package_name.as_str(),
                entry.package.version(),
                true,
            );
            insert_requirements(builder, entry, &by_key, &mut path)?;
        }
        Ok(())
    }

    fn parse_fallback(&self, repo: &Path, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        match read_manifest(repo, "requirements.txt") {
            Ok(content) => {
                for (name, version) in parse_requirements(&content) {
                    builder.push(name, version, true);
                }
                Ok(())
            }
            Err(ParseError::MissingManifest(requirements)) => {
                let content = match read_manifest(repo, "Pipfile.lock") {
                    Ok(content) => content,
                    Err(ParseError::MissingManifest(_)) => {
                        return Err(ParseError::MissingManifest(requirements))
                    }
                    Err(e) => return Err(e),
                };
                parse_pipfile_lock(repo, &content, builder)
            }
            Err(e) => Err(e),
        }
    }
}

/// Pushes `entry`'s requirements beneath it. `path` holds the keys of the
/// open ancestors so cyclic requirement graphs terminate.
fn insert_requirements<'a>(
    builder: &mut TreeBuilder,
    entry: &'a PipEntry,
    by_key: &HashMap<&str, &'a PipEntry>,
    path: &mut Vec<&'a str>,
) -> Result<(), ParseError> {
    if entry.dependencies.is_empty() {
        return Ok(());
    }
    path.push(entry.package.key.as_str());
    let result = builder.nested(|b| {
        for dep in &entry.dependencies {
            b.push(dep.package_name.as_str(), dep.version(), false);
            if path.contains(&dep.key.as_str()) {
                continue;
            }
            if let Some(&child) = by_key.get(dep.key.as_str()) {
                insert_requirements(b, child, by_key, path)?;
            }
        }
        Ok::<(), ParseError>(())
    });
    path.pop();
    result.map(|_| ())
}

/// Parses `name==version` lines. Comments, options, extras and environment
/// markers are stripped; other specifiers carry no pinned version and are
/// skipped.
pub fn parse_requirements(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .filter_map(|line| {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let line = line.split(';').next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with('-') {
                return None;
            }
            let Some((name, version)) = line.split_once("==") else {
                debug!(requirement = line, "Skipping unpinned requirement");
                return None;
            };
            let name = name.split('[').next().unwrap_or(name).trim();
            let version = version
                .trim_start()
                .split(|c: char| c == ',' || c.is_whitespace())
                .next()
                .unwrap_or("")
                .trim();
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some((name, version))
        })
        .collect()
}

/// `Pipfile.lock` resolves the full set flat; `Pipfile` (if present) tells
/// which of them were declared.
fn parse_pipfile_lock(
    repo: &Path,
    content: &str,
    builder: &mut TreeBuilder,
) -> Result<(), ParseError> {
    let lock: PipfileLock = serde_json::from_str(content)?;
    let declared: Option<HashSet<String>> = read_manifest(repo, "Pipfile")
        .ok()
        .and_then(|c| toml::from_str::<Pipfile>(&c).ok())
        .map(|p| p.packages.keys().map(|k| k.to_lowercase()).collect());

    for (name, entry) in &lock.default {
        let version = entry
            .version
            .as_deref()
            .map(|v| v.trim_start_matches("=="))
            .unwrap_or("");
        let direct = declared
            .as_ref()
            .map_or(true, |d| d.contains(&name.to_lowercase()));
        builder.push(name.as_str(), version, direct);
    }
    Ok(())
}
