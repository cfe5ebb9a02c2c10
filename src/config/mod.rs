//! # Configuration
//!
//! TOML configuration for the registry's discovery backends:
//!
//! ```toml
//! [connect]
//! timeout = 5
//!
//! [etcd]
//! endpoints = ["${ETCD_ENDPOINT:-http://127.0.0.1:2379}"]
//!
//! [consul]
//! address = "http://127.0.0.1:8500"
//! token = "${CONSUL_TOKEN}"
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are expanded from the environment before
//! parsing.

pub mod service_discovery;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::registry::Registry;

pub use service_discovery::{ConsulConfig, EtcdConfig, TlsFiles, TlsMaterial};

/// Top level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Defaults for connect calls
    #[serde(default)]
    pub connect: ConnectConfig,
    /// etcd backend, registered as `etcd://` (optional)
    pub etcd: Option<EtcdConfig>,
    /// Consul KV backend, registered as `consul://` (optional)
    pub consul: Option<ConsulConfig>,
}

/// Connect call defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectConfig {
    /// Overall connect timeout in seconds, 0 disables it
    #[serde(default = "default_connect_timeout")]
    pub timeout: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout: default_connect_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_str_with_env(&content)?;
        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse configuration text with environment variable expansion
    pub fn from_str_with_env(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(etcd) = &self.etcd {
            etcd.validate()?;
        }
        if let Some(consul) = &self.consul {
            consul.validate()?;
        }
        if self.etcd.is_none() && self.consul.is_none() {
            warn!("No discovery backend configured - only tcp:// targets will resolve");
        }
        Ok(())
    }

    /// Configured overall connect timeout
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build a registry with the default providers plus every configured
    /// discovery backend
    pub async fn build_registry(&self) -> Result<Registry> {
        let registry = Registry::with_defaults();

        if let Some(etcd) = &self.etcd {
            setup_etcd(&registry, etcd).await?;
        }
        if let Some(consul) = &self.consul {
            setup_consul(&registry, consul).await?;
        }

        Ok(registry)
    }
}

#[cfg(feature = "etcd-discovery")]
async fn setup_etcd(registry: &Registry, config: &EtcdConfig) -> Result<()> {
    crate::service_discovery::setup_etcd(registry, config).await
}

#[cfg(not(feature = "etcd-discovery"))]
async fn setup_etcd(_registry: &Registry, _config: &EtcdConfig) -> Result<()> {
    Err(anyhow::anyhow!(
        "etcd discovery not enabled. Enable the 'etcd-discovery' feature to use etcd"
    ))
}

#[cfg(feature = "consul-discovery")]
async fn setup_consul(registry: &Registry, config: &ConsulConfig) -> Result<()> {
    crate::service_discovery::setup_consul(registry, config).await
}

#[cfg(not(feature = "consul-discovery"))]
async fn setup_consul(_registry: &Registry, _config: &ConsulConfig) -> Result<()> {
    Err(anyhow::anyhow!(
        "Consul discovery not enabled. Enable the 'consul-discovery' feature to use Consul"
    ))
}

/// Expand environment variables in configuration content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Malformed ${VAR expression, keep it verbatim
            result.push_str(&rest[start..]);
            return result;
        };

        let expr = &after[..end];
        let value = match expr.split_once(":-") {
            Some((name, default)) => env::var(name).unwrap_or_else(|_| default.to_string()),
            None => env::var(expr).unwrap_or_else(|_| {
                warn!(
                    "Environment variable '{}' not found, using empty string",
                    expr
                );
                String::new()
            }),
        };
        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}
