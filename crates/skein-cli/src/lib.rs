//! skein CLI - builds and serves server-rendered Vue applications.
//!
//! The binary loads a [`State`](skein_config::State) from `package.json`,
//! `NODE_*` variables and flags, assembles bundler configurations from it and
//! hands them to the build [`Driver`](skein_bundler::Driver). What happens to
//! the compiled output depends on the workflow:
//!
//! - [`dev`] - in-memory bundle behind a hot-reloading development server
//! - [`serve`] - production SSR server over the output directory
//! - `build` - compile once (or keep recompiling with `--watch`) and exit
//!
//! # Example
//!
//! ```rust,no_run
//! use skein_cli::logger::LogContext;
//!
//! let log = LogContext::from_flags(1, 0, false);
//! log.init();
//! tracing::info!("starting");
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod serve;
pub mod ui;
pub mod watcher;

pub use error::{CliError, Result};
