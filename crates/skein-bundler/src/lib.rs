//! # skein-bundler
//!
//! Bundler configuration assembly and the build driver.
//!
//! Configurations are assembled from a [`Derivations`] context: one
//! development configuration, or a server and a client configuration in
//! production. The [`Driver`] hands them to a [`Bundler`], loads each
//! successful build into a servable artifact and reports readiness once.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use skein_bundler::{
//!     Driver, DriverOptions, ProcessBundler, ProcessRendererFactory, RendererLoader,
//!     RendererOptions, assemble,
//! };
//! use skein_config::{Derivations, Loader, Mode, Options};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Loader::from_process()?.load(&Options::new(Mode::Build)).await?;
//! let derivations = Derivations::new(state);
//!
//! let assembly = assemble(&derivations)?;
//! let bundler = Arc::new(ProcessBundler::from_derivations(&derivations)?);
//! let loader = RendererLoader::new(
//!     Arc::new(ProcessRendererFactory::from_derivations(&derivations)?),
//!     RendererOptions::from_derivations(&derivations)?,
//! );
//!
//! let (driver, ready) = Driver::spawn(bundler, loader, assembly.into_configs(), DriverOptions::default());
//! ready.wait().await?;
//! driver.finished().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`Derivations`]: skein_config::Derivations

pub mod assemble;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod error;
pub mod render;

pub use assemble::{Assembly, assemble};
pub use compiler::{Bundler, CompileStats, ProcessBundler};
pub use config::{BundlerConfig, Plugin, Variant};
pub use driver::{
    ArtifactLoader, Driver, DriverEvent, DriverFailure, DriverHandle, DriverOptions, Phase,
    Readiness, Register, Snapshot,
};
pub use error::{BundlerError, Result};
pub use render::{
    ProcessRendererFactory, RenderContext, RenderEngine, RenderError, RendererFactory,
    RendererLoader, RendererOptions,
};
