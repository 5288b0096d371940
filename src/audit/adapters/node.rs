//! Node.js packages from `npm ls --json` or `package-lock.json`.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use crate::traits::{read_manifest, DependencyAdapter, ParseError};

const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct NodeAdapter;

impl DependencyAdapter for NodeAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::NodeJs
    }

    fn tool_command(&self) -> ToolCommand {
        ToolCommand::new("npm", &["ls", "--json", "--all"])
    }

    fn parse_tool_output(
        &self,
        _repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError> {
        let value = parse_deep(stdout)?;
        let root = value
            .as_object()
            .ok_or_else(|| ParseError::InvalidContent("npm ls output is not an object".into()))?;

        // npm ls lists only the project's own requirements at the top level.
        if let Some(deps) = root.get("dependencies").and_then(Value::as_object) {
            insert_nested(builder, deps, Some(None))?;
        }
        Ok(())
    }

    fn parse_fallback(&self, repo: &Path, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let content = read_manifest(repo, "package-lock.json")?;
        let lock = parse_deep(&content)?;
        let lock = lock.as_object().ok_or_else(|| {
            ParseError::InvalidContent("package-lock.json is not an object".into())
        })?;

        if let Some(deps) = lock.get("dependencies").and_then(Value::as_object) {
            let direct = read_manifest(repo, "package.json")
                .ok()
                .and_then(|c| serde_json::from_str::<Value>(&c).ok())
                .and_then(|v| v.as_object().map(declared_names));
            return insert_nested(builder, deps, Some(direct.as_ref()));
        }

        if let Some(packages) = lock.get("packages").and_then(Value::as_object) {
            return insert_packages(builder, packages);
        }

        Err(ParseError::InvalidContent(
            "package-lock.json has neither `dependencies` nor `packages`".into(),
        ))
    }
}

/// Parses JSON without serde_json's 128-level nesting limit. Deep input is
/// bounded by the tree builder's depth cap instead.
fn parse_deep(content: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(content);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Names declared in a package.json-shaped object.
fn declared_names(manifest: &Map<String, Value>) -> HashSet<String> {
    DEPENDENCY_SECTIONS
        .iter()
        .filter_map(|section| manifest.get(*section).and_then(Value::as_object))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

/// Walks a `{name: {version, dependencies}}` map, recursing into nested
/// `dependencies` objects.
///
/// `top_level` is `None` below the first level. At the first level it holds
/// the set of declared names when known; `Some(None)` marks every top-level
/// entry direct.
fn insert_nested(
    builder: &mut TreeBuilder,
    deps: &Map<String, Value>,
    top_level: Option<Option<&HashSet<String>>>,
) -> Result<(), ParseError> {
    for (name, entry) in deps {
        let entry = entry.as_object().ok_or_else(|| {
            ParseError::InvalidContent(format!("dependency entry `{name}` is not an object"))
        })?;
        let version = entry.get("version").and_then(Value::as_str).unwrap_or("");
        let direct = match top_level {
            Some(Some(declared)) => declared.contains(name),
            Some(None) => true,
            None => false,
        };
        builder.push(name.as_str(), version, direct);

        if let Some(children) = entry.get("dependencies").and_then(Value::as_object) {
            if !children.is_empty() {
                builder.nested(|b| insert_nested(b, children, None))?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PackageNode<'a> {
    version: &'a str,
    children: BTreeMap<&'a str, PackageNode<'a>>,
}

/// Lockfile v2/v3: `packages` is keyed by install path
/// (`node_modules/a/node_modules/b`), which encodes the nesting.
fn insert_packages(
    builder: &mut TreeBuilder,
    packages: &Map<String, Value>,
) -> Result<(), ParseError> {
    let declared = packages
        .get("")
        .and_then(Value::as_object)
        .map(declared_names);

    let mut root = PackageNode::default();
    for (path, entry) in packages {
        if !path.starts_with("node_modules/") {
            continue; // project root or workspace member
        }
        let segments: Vec<&str> = path
            .split("node_modules/")
            .map(|s| s.trim_end_matches('/'))
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() > builder.max_depth() {
            debug!(path = %path, "Skipping lockfile entry deeper than the depth cap");
            continue;
        }

        let mut node = &mut root;
        for segment in segments {
            node = node.children.entry(segment).or_default();
        }
        node.version = entry.get("version").and_then(Value::as_str).unwrap_or("");
    }

    insert_package_nodes(builder, &root.children, Some(declared.as_ref()))
}

fn insert_package_nodes(
    builder: &mut TreeBuilder,
    nodes: &BTreeMap<&str, PackageNode<'_>>,
    top_level: Option<Option<&HashSet<String>>>,
) -> Result<(), ParseError> {
    for (name, node) in nodes {
        let direct = match top_level {
            Some(Some(declared)) => declared.contains(*name),
            Some(None) => true,
            None => false,
        };
        builder.push(*name, node.version, direct);
        if !node.children.is_empty() {
            builder.nested(|b| insert_package_nodes(b, &node.children, None))?;
        }
    }
    Ok(())
}
