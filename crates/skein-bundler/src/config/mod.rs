//! Typed bundler configuration.
//!
//! Plugins and loaders are plain data (a name plus an options tree), so two
//! configurations assembled from the same state compare equal. The external
//! bundler adapter maps plugin names to its own implementations.

pub mod merge;
mod module;

pub use merge::deep_merge;
pub use module::{Extraction, Loader, LoaderChain, ModuleOptions, Rule, RuleTest};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_config::graph::Pattern;
use skein_config::graph::selectors::{ExternalsAllow, StatsOptions};

use crate::error::{BundlerError, Result};

/// Which of the three configurations this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Development,
    Server,
    Client,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Development => "development",
            Variant::Server => "server",
            Variant::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Web,
    Node,
}

/// One bundler configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    pub name: Variant,
    pub target: Target,
    #[serde(default)]
    pub entry: BTreeMap<String, Vec<PathBuf>>,
    pub context: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,
    pub output: Output,
    pub watch_options: WatchOptions,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    pub module: ModuleOptions,
    pub resolve: Resolve,
    pub resolve_loader: ResolveLoader,
    pub performance: Performance,
    pub node: BTreeMap<String, Value>,
    pub stats: StatsOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals: Option<NodeExternals>,
}

impl BundlerConfig {
    /// Deep-merge `overlay` over this configuration.
    pub fn merge(self, overlay: &Overlay) -> Result<Self> {
        let mut base = serde_json::to_value(&self).map_err(BundlerError::Merge)?;
        let overlay = serde_json::to_value(overlay).map_err(BundlerError::Merge)?;
        deep_merge(&mut base, overlay);
        serde_json::from_value(base).map_err(BundlerError::Merge)
    }

    pub fn plugin(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub chunk_filename: String,
    pub devtool_module_filename_template: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub public_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    pub aggregate_timeout: u64,
    pub ignored: Pattern,
    pub poll: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            aggregate_timeout: 300,
            ignored: Pattern::new("node_modules", false).expect("valid watch ignore pattern"),
            poll: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolve {
    pub symlinks: bool,
    pub plugins: Vec<Plugin>,
    pub extensions: Vec<String>,
    pub modules: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveLoader {
    pub modules: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub hints: bool,
}

/// A bundler plugin by name, with its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl Plugin {
    pub fn new(name: impl Into<String>, options: Value) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

/// Server-bundle externals: packages from `modules_dir` stay `require`d at
/// runtime unless the whitelist matches the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExternals {
    pub modules_dir: PathBuf,
    /// Package names the manifest declares.
    pub modules: Vec<String>,
    pub whitelist: Vec<ExternalsAllow>,
}

impl NodeExternals {
    /// Whether a module request is left to the runtime `require`.
    pub fn is_external(&self, request: &str) -> bool {
        let package = package_name(request);
        self.modules.iter().any(|m| m == package)
            && !self.whitelist.iter().any(|allow| allow.matches(request))
    }
}

/// `@scope/name/file` -> `@scope/name`, `name/file` -> `name`.
fn package_name(request: &str) -> &str {
    let mut parts = request.splitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some(scope), Some(name)) if scope.starts_with('@') => {
            &request[..scope.len() + 1 + name.len()]
        }
        (Some(name), _) => name,
        _ => request,
    }
}

/// Partial configuration merged over a base.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub entry: BTreeMap<String, Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputOverlay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub externals: Option<NodeExternals>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_handles_scopes_and_subpaths() {
        assert_eq!(package_name("vue"), "vue");
        assert_eq!(package_name("lodash/merge"), "lodash");
        assert_eq!(package_name("@babel/polyfill"), "@babel/polyfill");
        assert_eq!(package_name("@babel/runtime/helpers/x"), "@babel/runtime");
    }

    #[test]
    fn externals_skip_whitelisted_requests() {
        let externals = NodeExternals {
            modules_dir: PathBuf::from("/app/node_modules"),
            modules: vec!["vue".into(), "@babel/polyfill".into(), "normalize.css".into()],
            whitelist: vec![
                ExternalsAllow::Pattern(Pattern::extensions(["css", "vue"], false).unwrap()),
                ExternalsAllow::Module("@babel/polyfill".into()),
            ],
        };

        assert!(externals.is_external("vue"));
        assert!(externals.is_external("vue/dist/vue.runtime.js"));
        assert!(!externals.is_external("normalize.css"));
        assert!(!externals.is_external("@babel/polyfill"));
        assert!(!externals.is_external("./local"));
    }
}
