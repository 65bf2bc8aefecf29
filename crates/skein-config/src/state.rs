//! The immutable input snapshot every derivation reads from.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::manifest::PackageJson;

/// Which CLI workflow produced the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Start,
    Build,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Start => f.write_str("start"),
            Mode::Build => f.write_str("build"),
        }
    }
}

/// Where the compiled bundle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTarget {
    Client,
    Server,
}

impl RenderTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderTarget::Client => "client",
            RenderTarget::Server => "server",
        }
    }
}

/// Verbosity ladder shared by the CLI, the state and the serving layer.
///
/// `Warn` is the baseline; each `-v` moves one step up, each `-q` one step
/// down, saturating at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl LogLevel {
    const LADDER: [LogLevel; 6] = [
        LogLevel::Silent,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Verbose,
        LogLevel::Debug,
    ];

    /// Apply `-v`/`-q` counts to the `warn` baseline.
    pub fn from_counts(verbose: u8, quiet: u8) -> Self {
        let base = LogLevel::Warn as i32;
        let index = (base + i32::from(verbose) - i32::from(quiet))
            .clamp(0, Self::LADDER.len() as i32 - 1);
        Self::LADDER[index as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Silent => "silent",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::LADDER
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log level '{s}'"))
    }
}

/// Asset classes with their own url-loader rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Media,
    Font,
    Image,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 3] = [
        AssetCategory::Media,
        AssetCategory::Font,
        AssetCategory::Image,
    ];

    /// Output subdirectory under the assets directory.
    pub fn directory(self) -> &'static str {
        match self {
            AssetCategory::Media => "media",
            AssetCategory::Font => "fonts",
            AssetCategory::Image => "images",
        }
    }
}

/// Extension tables per asset category. The tables are disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extensions {
    pub media: Vec<String>,
    pub font: Vec<String>,
    pub image: Vec<String>,
}

impl Extensions {
    pub fn get(&self, category: AssetCategory) -> &[String] {
        match category {
            AssetCategory::Media => &self.media,
            AssetCategory::Font => &self.font,
            AssetCategory::Image => &self.image,
        }
    }

    /// All extensions, category order preserved.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        AssetCategory::ALL
            .into_iter()
            .flat_map(|category| self.get(category).iter().map(String::as_str))
    }
}

impl Default for Extensions {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            media: owned(&["mp4", "webm", "ogg", "mp3", "wav", "flac", "aac"]),
            font: owned(&["woff", "woff2", "eot", "ttf", "otf"]),
            image: owned(&["png", "jpg", "jpeg", "gif", "svg"]),
        }
    }
}

/// Entry modules for the client, server and tool-provided shims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entries {
    pub client: PathBuf,
    pub server: PathBuf,
    pub polyfill: PathBuf,
    pub hot_middleware: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangleOptions {
    pub safari10: bool,
}

/// Options handed to the JS minifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifyOptions {
    /// Pattern of comments kept in minified output.
    pub comments: String,
    pub mangle: MangleOptions,
    pub warnings: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            comments: r"^\**!|@preserve|@license|@cc_on".to_string(),
            mangle: MangleOptions { safari10: true },
            warnings: false,
        }
    }
}

pub const DEFAULT_OPTIONAL_DEPENDENCIES: [&str; 7] = [
    "lodash",
    "node-sass",
    "sass-loader",
    "stylus",
    "stylus-loader",
    "less",
    "less-loader",
];

/// Immutable build input snapshot.
///
/// Built once by the [`Loader`](crate::Loader); variants such as the server
/// render target are new values made with [`State::with_render_target`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub mode: Mode,
    pub node_env: String,
    pub host: String,
    pub port: u16,
    pub context: PathBuf,
    pub home: PathBuf,
    pub output_path: PathBuf,
    pub output_public_path: String,
    pub index_template: PathBuf,
    pub static_assets: Option<String>,
    pub devtool: String,
    pub watch: bool,
    pub interactive: bool,
    pub log_level: LogLevel,
    pub entries: Entries,
    pub ssr_client_filename: String,
    pub ssr_server_filename: String,
    pub extensions: Extensions,
    pub minify_options: MinifyOptions,
    pub module_paths: Vec<PathBuf>,
    pub package_json: PackageJson,
    pub version: String,
    pub assets_directory: String,
    pub render_target: RenderTarget,
    pub postcss_config: PathBuf,
    pub optional_dependencies: Vec<String>,
    pub bundler_command: Vec<String>,
    pub renderer_command: Vec<String>,
}

impl State {
    /// A copy of this state compiled for another render target.
    pub fn with_render_target(&self, render_target: RenderTarget) -> State {
        State {
            render_target,
            ..self.clone()
        }
    }
}
