use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_config::graph::Pattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOptions {
    /// Modules matching this are not parsed for imports.
    pub no_parse: Pattern,
    pub rules: Vec<Rule>,
}

/// What a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleTest {
    Pattern(Pattern),
    /// Exactly this file.
    File { file: PathBuf },
}

impl RuleTest {
    pub fn matches(&self, resource: &str) -> bool {
        match self {
            RuleTest::Pattern(pattern) => pattern.is_match(resource),
            RuleTest::File { file } => file.as_os_str() == resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub test: RuleTest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<LoaderChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<PathBuf>>,
}

impl Rule {
    pub fn loader(test: RuleTest, loader: impl Into<String>, options: Value) -> Self {
        Self {
            test,
            loader: Some(loader.into()),
            options: Some(options),
            use_: None,
            include: None,
        }
    }

    pub fn chain(test: RuleTest, chain: LoaderChain) -> Self {
        Self {
            test,
            loader: None,
            options: None,
            use_: Some(chain),
            include: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loader {
    pub loader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl Loader {
    pub fn new(loader: impl Into<String>, options: Value) -> Self {
        Self {
            loader: loader.into(),
            options: Some(options),
        }
    }

    pub fn bare(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: None,
        }
    }
}

/// Loaders applied right to left, or an extracted-CSS chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoaderChain {
    Extract { extract: Extraction },
    Loaders(Vec<Loader>),
}

impl LoaderChain {
    /// Loader names in application order as written.
    pub fn names(&self) -> Vec<&str> {
        match self {
            LoaderChain::Extract { extract } => extract
                .use_
                .iter()
                .map(|l| l.loader.as_str())
                .chain(std::iter::once(extract.fallback.as_str()))
                .collect(),
            LoaderChain::Loaders(loaders) => loaders.iter().map(|l| l.loader.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(rename = "use")]
    pub use_: Vec<Loader>,
    pub fallback: String,
}
