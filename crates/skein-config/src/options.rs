//! Command-line overrides applied on top of discovered defaults.

use std::path::PathBuf;

use crate::state::{LogLevel, Mode};

/// Value passed to `--static-assets` to disable static asset copying.
pub const DISABLED: &str = "false";

/// Flags collected by the CLI. `None` keeps the discovered default.
#[derive(Debug, Clone)]
pub struct Options {
    pub mode: Mode,
    pub watch: Option<bool>,
    pub context: Option<PathBuf>,
    pub index_template: Option<PathBuf>,
    pub devtool: Option<String>,
    pub static_assets: Option<String>,
    pub entry_client: Option<PathBuf>,
    pub entry_server: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub output_public_path: Option<String>,
    pub log_level: LogLevel,
    pub interactive: bool,
}

impl Options {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            watch: None,
            context: None,
            index_template: None,
            devtool: None,
            static_assets: None,
            entry_client: None,
            entry_server: None,
            output_path: None,
            output_public_path: None,
            log_level: LogLevel::default(),
            interactive: false,
        }
    }

    /// The `--static-assets` override: `Some(None)` disables copying.
    pub(crate) fn static_assets_override(&self) -> Option<Option<String>> {
        self.static_assets.as_ref().map(|value| {
            if value == DISABLED {
                None
            } else {
                Some(value.clone())
            }
        })
    }
}
