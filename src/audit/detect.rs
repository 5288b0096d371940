//! Ecosystem detection from manifest presence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Package ecosystem of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Go,
    NodeJs,
    Python,
    Rust,
    Java,
    Php,
    Ruby,
    None,
}

/// Manifest files per ecosystem, in detection priority order.
const MANIFESTS: &[(Ecosystem, &[&str])] = &[
    (Ecosystem::Go, &["go.mod"]),
    (
        Ecosystem::NodeJs,
        &["package.json", "package-lock.json", "yarn.lock"],
    ),
    (
        Ecosystem::Python,
        &["requirements.txt", "Pipfile", "Pipfile.lock"],
    ),
    (Ecosystem::Rust, &["Cargo.toml", "Cargo.lock"]),
    (Ecosystem::Java, &["pom.xml", "build.gradle"]),
    (Ecosystem::Php, &["composer.json", "composer.lock"]),
    (Ecosystem::Ruby, &["Gemfile", "Gemfile.lock"]),
];

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Go => "go",
            Ecosystem::NodeJs => "nodejs",
            Ecosystem::Python => "python",
            Ecosystem::Rust => "rust",
            Ecosystem::Java => "java",
            Ecosystem::Php => "php",
            Ecosystem::Ruby => "ruby",
            Ecosystem::None => "none",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the first ecosystem whose manifest exists under `repo`, or
/// [`Ecosystem::None`]. Never fails.
pub fn detect(repo: &Path) -> Ecosystem {
    MANIFESTS
        .iter()
        .find(|(_, files)| files.iter().any(|f| repo.join(f).is_file()))
        .map(|(ecosystem, _)| *ecosystem)
        .unwrap_or(Ecosystem::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect(dir.path()), Ecosystem::None);
    }

    #[test]
    fn test_detect_each_manifest() {
        for (ecosystem, files) in MANIFESTS {
            for file in *files {
                let dir = tempfile::tempdir().unwrap();
                std::fs::write(dir.path().join(file), "").unwrap();
                assert_eq!(detect(dir.path()), *ecosystem, "manifest {file}");
            }
        }
    }

    #[test]
    fn test_detect_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        std::fs::write(dir.path().join("pom.xml"), "").unwrap();
        assert_eq!(detect(dir.path()), Ecosystem::Go);
    }

    #[test]
    fn test_directory_named_like_manifest_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("go.mod")).unwrap();
        assert_eq!(detect(dir.path()), Ecosystem::None);
    }

    #[test]
    fn test_serialized_tags() {
        assert_eq!(serde_json::to_string(&Ecosystem::NodeJs).unwrap(), "\"nodejs\"");
        assert_eq!(Ecosystem::NodeJs.to_string(), "nodejs");
        assert_eq!(Ecosystem::None.to_string(), "none");
    }
}
