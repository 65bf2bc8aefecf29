//! Configuration assembly.
//!
//! Variants are deep-merged over a shared base built from derivation graph
//! outputs. Assembly is pure: no I/O beyond what the graph already did, and
//! the same state always yields equal configurations.

mod base;
mod development;
pub mod plugins;
mod production;
pub mod rules;

pub use base::base;
pub use development::development;
pub use production::{client as production_client, server as production_server};

use skein_config::graph::selectors::COND_PRODUCTION;
use skein_config::{Derivations, RenderTarget};

use crate::config::BundlerConfig;
use crate::error::Result;

/// The configurations one session hands to the bundler.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    Development(BundlerConfig),
    Production {
        server: BundlerConfig,
        client: BundlerConfig,
    },
}

impl Assembly {
    /// Configurations in compile order (server before client).
    pub fn configs(&self) -> Vec<&BundlerConfig> {
        match self {
            Assembly::Development(config) => vec![config],
            Assembly::Production { server, client } => vec![server, client],
        }
    }

    pub fn into_configs(self) -> Vec<BundlerConfig> {
        match self {
            Assembly::Development(config) => vec![config],
            Assembly::Production { server, client } => vec![server, client],
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Assembly::Production { .. })
    }
}

/// Development assembly unless the environment is production.
pub fn assemble(d: &Derivations) -> Result<Assembly> {
    if d.get(&COND_PRODUCTION)? {
        production(d)
    } else {
        Ok(Assembly::Development(development(d)?))
    }
}

/// Server and client configurations. The server half is derived from a fork
/// of `d` targeting the server, sharing every unaffected memo entry.
pub fn production(d: &Derivations) -> Result<Assembly> {
    let server_derivations = d.fork(d.state().with_render_target(RenderTarget::Server));
    let server = production_server(&server_derivations)?;

    let client = if d.state().render_target == RenderTarget::Client {
        production_client(d)?
    } else {
        production_client(&d.fork(d.state().with_render_target(RenderTarget::Client)))?
    };

    Ok(Assembly::Production { server, client })
}
