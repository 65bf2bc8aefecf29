//! Development server.
//!
//! The driver compiles the development configuration into a scratch
//! directory; after each successful compile the [`DevBundleLoader`] reads
//! that directory into a [`BundleCache`] which the [`DevServer`] serves from
//! memory. Connected browsers hear about every compile over server-sent
//! events and reload themselves.

pub mod server;
pub mod state;

pub use server::{DevServer, build_router};
pub use state::{BundleCache, ClientRegistry, DevBundleLoader, DevServerState, SharedState};
