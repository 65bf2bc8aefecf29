//! Project manifest (`package.json`) discovery and parsing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the tool reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Inline postcss configuration; when present the project root is the
    /// postcss config location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcss: Option<Value>,

    #[serde(default)]
    pub skein: ToolSettings,
}

/// Settings read from the manifest's `skein` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    /// Optional dependency names probed for conditional loaders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_dependencies: Option<Vec<String>>,

    /// Bundler command line; the configuration file path is appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundler: Option<Vec<String>>,

    /// SSR renderer command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<Vec<String>>,
}

impl PackageJson {
    /// Parse manifest contents.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| ConfigError::InvalidManifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a manifest from disk.
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Whether `name` appears in `dependencies` or `devDependencies`.
    pub fn declares(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    /// Every declared package name, runtime and development.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .map(String::as_str)
    }

    /// Tidy common manifest sloppiness and report what looked wrong.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.name.as_mut() {
            Some(name) => {
                let trimmed = name.trim();
                if trimmed.len() != name.len() {
                    warnings.push(format!("name '{name}' has surrounding whitespace"));
                    *name = trimmed.to_string();
                }
                if name.is_empty() {
                    warnings.push("name is empty".to_string());
                    self.name = None;
                }
            }
            None => warnings.push("no name field".to_string()),
        }

        if self.version.as_deref().is_none_or(|v| v.trim().is_empty()) {
            warnings.push("no version field".to_string());
            self.version = None;
        }

        let duplicated: Vec<String> = self
            .dev_dependencies
            .keys()
            .filter(|name| self.dependencies.contains_key(*name))
            .cloned()
            .collect();
        for name in duplicated {
            warnings.push(format!(
                "'{name}' is listed in both dependencies and devDependencies"
            ));
            self.dev_dependencies.remove(&name);
        }

        warnings
    }
}

/// Walk up from `start` to the nearest directory containing `package.json`.
pub async fn find_package_json(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(MANIFEST_FILE);
        if tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_dependencies_and_tool_settings() {
        let pkg = PackageJson::parse(
            Path::new("package.json"),
            r#"{
                "name": "app",
                "version": "1.0.0",
                "dependencies": { "vue": "^2.5.0" },
                "devDependencies": { "less": "^3.0.0" },
                "skein": { "optionalDependencies": ["less"] }
            }"#,
        )
        .unwrap();

        assert!(pkg.declares("vue"));
        assert!(pkg.declares("less"));
        assert!(!pkg.declares("stylus"));
        assert_eq!(
            pkg.skein.optional_dependencies,
            Some(vec!["less".to_string()])
        );
    }

    #[test]
    fn rejects_malformed_json() {
        let err = PackageJson::parse(Path::new("/x/package.json"), "{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidManifest { .. }));
        assert!(err.to_string().contains("/x/package.json"));
    }

    #[test]
    fn normalize_reports_and_fixes() {
        let mut pkg = PackageJson {
            name: Some("  app ".into()),
            version: None,
            ..Default::default()
        };
        pkg.dependencies.insert("vue".into(), "2".into());
        pkg.dev_dependencies.insert("vue".into(), "2".into());

        let warnings = pkg.normalize();

        assert_eq!(pkg.name.as_deref(), Some("app"));
        assert!(pkg.dev_dependencies.is_empty());
        assert_eq!(warnings.len(), 3);
    }

    #[tokio::test]
    async fn finds_manifest_in_ancestor() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{}").unwrap();
        let nested = temp.path().join("src/components");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_package_json(&nested).await.unwrap();
        assert_eq!(found, temp.path().join("package.json"));
    }
}
