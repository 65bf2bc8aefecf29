//! Command implementations for the skein CLI.
//!
//! - [`start`] - development server, or the production SSR server
//! - [`build`] - production build
//!
//! Both go through a [`Session`](session::Session): load the state, assemble
//! the bundler configurations, then run the build driver with an optional
//! file watcher.

pub mod build;
pub(crate) mod session;
pub mod start;

pub use build::execute as build_execute;
pub use start::execute as start_execute;
