//! State loading and configuration derivation for skein.
//!
//! The [`Loader`] gathers the project manifest, `NODE_*` environment
//! variables, CLI [`Options`] and a handful of filesystem probes into one
//! immutable [`State`]. Everything the bundler configuration needs is then
//! derived from that state through the memoized [`graph`].
//!
//! ```no_run
//! use skein_config::{Derivations, Loader, Mode, Options, graph::selectors};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Loader::from_process()?.load(&Options::new(Mode::Start)).await?;
//! let derivations = Derivations::new(state);
//! let hmr = derivations.get(&selectors::COND_HMR)?;
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod error;
pub mod graph;
pub mod loader;
pub mod manifest;
pub mod options;
pub mod resolve;
pub mod state;

pub use environment::Environment;
pub use error::{ConfigError, DeriveError, Result};
pub use graph::{Derivations, Node};
pub use loader::Loader;
pub use manifest::PackageJson;
pub use options::Options;
pub use resolve::{ModuleResolver, NodeResolver};
pub use state::{AssetCategory, Entries, Extensions, LogLevel, Mode, RenderTarget, State};
