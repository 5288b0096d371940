//! Java artifacts from `mvn dependency:tree`, `pom.xml` or `build.gradle`.
//!
//! Artifact names are `groupId:artifactId`. The manifest fallbacks cannot see
//! transitive resolution, so every artifact they find is direct.

use std::path::Path;

use super::{insert_by_depth, DepthEntry};
use crate::audit::detect::Ecosystem;
use crate::audit::tool::ToolCommand;
use crate::audit::tree::TreeBuilder;
use crate::traits::{read_manifest, DependencyAdapter, ParseError};

const GRADLE_CONFIGURATIONS: &[&str] = &[
    "implementation",
    "api",
    "compile",
    "compileOnly",
    "runtimeOnly",
    "runtime",
    "testImplementation",
    "testCompile",
    "testRuntimeOnly",
    "annotationProcessor",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct JavaAdapter;

impl DependencyAdapter for JavaAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Java
    }

    fn tool_command(&self) -> ToolCommand {
        ToolCommand::new("mvn", &["-B", "dependency:tree"])
    }

    fn parse_tool_output(
        &self,
        _repo: &Path,
        stdout: &str,
        builder: &mut TreeBuilder,
    ) -> Result<(), ParseError> {
        let entries: Vec<DepthEntry> = stdout.lines().filter_map(parse_tree_line).collect();
        insert_by_depth(builder, &entries);
        Ok(())
    }

    fn parse_fallback(&self, repo: &Path, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let artifacts = match read_manifest(repo, "pom.xml") {
            Ok(pom) => scan_pom(&pom),
            Err(ParseError::MissingManifest(pom)) => match read_manifest(repo, "build.gradle") {
                Ok(gradle) => scan_gradle(&gradle),
                Err(ParseError::MissingManifest(_)) => {
                    return Err(ParseError::MissingManifest(pom))
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        };

        for (name, version) in artifacts {
            builder.push(name, version, true);
        }
        Ok(())
    }
}

/// Parses one `dependency:tree` line, e.g.
/// `[INFO] |  \- org.slf4j:slf4j-api:jar:1.7.36:compile`.
/// Each nesting level is three columns wide.
fn parse_tree_line(line: &str) -> Option<DepthEntry> {
    let line = line.strip_prefix("[INFO] ").unwrap_or(line);
    let marker = line.find("+- ").or_else(|| line.find("\\- "))?;
    if !line[..marker].chars().all(|c| c == ' ' || c == '|') {
        return None;
    }

    let coordinates = line[marker + 3..].split_whitespace().next()?;
    let parts: Vec<&str> = coordinates.split(':').collect();
    // group:artifact:type[:classifier]:version[:scope]
    let version = match parts.len() {
        4 | 5 => parts[3],
        6 => parts[4],
        _ => return None,
    };
    Some(DepthEntry {
        depth: marker / 3 + 1,
        name: format!("{}:{}", parts[0], parts[1]),
        version: version.to_string(),
    })
}

/// Tag-value scan of `<dependency>` blocks. Dependency management and build
/// plugin sections are skipped; `${property}` versions are resolved against
/// `<properties>`.
pub fn scan_pom(content: &str) -> Vec<(String, String)> {
    let content = strip_section(&strip_comments(content), "dependencyManagement");
    let content = strip_section(&content, "build");
    let properties = tag_value(&content, "properties").unwrap_or("");

    let mut artifacts = Vec::new();
    let mut rest = content.as_str();
    while let Some(start) = rest.find("<dependency>") {
        let after = &rest[start + "<dependency>".len()..];
        let Some(end) = after.find("</dependency>") else {
            break;
        };
        let block = &after[..end];
        rest = &after[end + "</dependency>".len()..];

        let group = tag_value(block, "groupId");
        let artifact = tag_value(block, "artifactId");
        let (Some(group), Some(artifact)) = (group, artifact) else {
            continue;
        };
        let version = tag_value(block, "version").unwrap_or("");
        let version = match version
            .strip_prefix("${")
            .and_then(|v| v.strip_suffix('}'))
        {
            Some(property) => tag_value(properties, property).unwrap_or(version),
            None => version,
        };
        artifacts.push((format!("{group}:{artifact}"), version.to_string()));
    }
    artifacts
}

/// String-notation coordinates such as `implementation 'com.google.guava:guava:32.1.2-jre'`.
pub fn scan_gradle(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let configuration = line
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()?;
            if !GRADLE_CONFIGURATIONS.contains(&configuration) {
                return None;
            }
            let quote = line.find(|c: char| c == '\'' || c == '"')?;
            let quote_char = line[quote..].chars().next()?;
            let inner = &line[quote + 1..];
            let coordinates = &inner[..inner.find(quote_char)?];
            let mut parts = coordinates.split(':');
            let (Some(group), Some(artifact), Some(version)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return None;
            };
            Some((format!("{group}:{artifact}"), version.to_string()))
        })
        .collect()
}

fn tag_value<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = content.find(&open)? + open.len();
    let end = content[start..].find(&close)? + start;
    Some(content[start..end].trim())
}

fn strip_section(content: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(&close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
