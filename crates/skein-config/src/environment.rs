//! `NODE_`-prefixed environment variables.

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEVELOPMENT: &str = "development";
pub const PRODUCTION: &str = "production";

/// Runtime environment read from `NODE_ENV`, `NODE_PORT` and `NODE_HOST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_env() -> String {
    DEVELOPMENT.to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            env: default_env(),
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Environment {
    /// Defaults merged with the process environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Environment::default()))
            .merge(Env::prefixed("NODE_").only(&["env", "port", "host"]))
    }

    /// Extract from the process environment.
    ///
    /// Empty variables fall back to the defaults; a non-numeric
    /// `NODE_PORT` is an error.
    pub fn from_env() -> Result<Self> {
        Self::extract(Self::figment())
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        let mut environment: Environment = figment
            .extract()
            .map_err(|e| ConfigError::Environment(e.to_string()))?;

        if environment.env.trim().is_empty() {
            environment.env = default_env();
        }
        if environment.host.trim().is_empty() {
            environment.host = default_host();
        }
        Ok(environment)
    }

    pub fn is_production(&self) -> bool {
        self.env == PRODUCTION
    }
}
