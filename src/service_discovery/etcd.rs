//! etcd candidate source
//!
//! Uses the etcd v3 key space. A key holding a value is a leaf; a path with
//! keys below `path/` is a directory. Lookups are pinned to the revision in
//! the header of the first response.

use anyhow::Result;
use async_trait::async_trait;
use etcd_client::{Certificate, Client, ConnectOptions, GetOptions, Identity, TlsOptions};
use std::sync::Arc;
use tracing::debug;

use crate::config::service_discovery::EtcdConfig;
use crate::error::{SourceError, SourceResult};
use crate::provider::DiscoveryProvider;
use crate::registry::Registry;
use crate::service_discovery::traits::{collect_children, dir_prefix, CandidateSource, Node};

/// Scheme the etcd provider is registered under
pub const SCHEME: &str = "etcd";

/// Candidate source reading from an etcd cluster
#[derive(Clone)]
pub struct EtcdSource {
    client: Client,
}

impl std::fmt::Debug for EtcdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdSource")
            .field("client", &"<etcd_client::Client>")
            .finish()
    }
}

impl EtcdSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to etcd using `config`
    pub async fn connect(config: &EtcdConfig) -> Result<Self> {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(config.connect_timeout())
            .with_timeout(config.request_timeout());

        if let Some((user, password)) = config.credentials() {
            options = options.with_user(user, password);
        }

        if let Some(files) = config.tls_files() {
            let material = files.load().await?;
            let mut tls = TlsOptions::new().identity(Identity::from_pem(material.cert, material.key));
            if let Some(ca) = material.ca {
                tls = tls.ca_certificate(Certificate::from_pem(ca));
            }
            options = options.with_tls(tls);
        }

        let client = Client::connect(&config.endpoints, Some(options))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to etcd: {}", e))?;
        debug!(endpoints = ?config.endpoints, "Connected to etcd");
        Ok(Self::new(client))
    }
}

fn get_options(revision: Option<i64>) -> GetOptions {
    match revision {
        Some(rev) => GetOptions::new().with_revision(rev),
        None => GetOptions::new(),
    }
}

fn map_etcd_error(err: etcd_client::Error) -> SourceError {
    match err {
        etcd_client::Error::TransportError(e) => SourceError::transport(e.to_string()),
        etcd_client::Error::IoError(e) => SourceError::transport(e.to_string()),
        other => SourceError::backend(other.to_string()),
    }
}

#[async_trait]
impl CandidateSource for EtcdSource {
    fn name(&self) -> &'static str {
        "etcd"
    }

    async fn current_revision(&self, path: &str) -> SourceResult<Option<i64>> {
        let mut client = self.client.clone();
        let resp = client
            .get(path, Some(GetOptions::new().with_count_only()))
            .await
            .map_err(map_etcd_error)?;
        Ok(resp.header().map(|header| header.revision()))
    }

    async fn read(&self, path: &str, revision: Option<i64>) -> SourceResult<Node> {
        let mut client = self.client.clone();
        let resp = client
            .get(path, Some(get_options(revision)))
            .await
            .map_err(map_etcd_error)?;

        if let Some(kv) = resp.kvs().first() {
            let value = kv
                .value_str()
                .map_err(|e| SourceError::invalid_data(path, e.to_string()))?;
            return Ok(Node::Leaf(value.to_string()));
        }

        let prefix = dir_prefix(path);
        let resp = client
            .get(
                prefix.as_str(),
                Some(get_options(revision).with_prefix().with_count_only()),
            )
            .await
            .map_err(map_etcd_error)?;

        if resp.count() > 0 {
            Ok(Node::Directory)
        } else {
            Err(SourceError::not_found(path))
        }
    }

    async fn list_children(&self, path: &str, revision: Option<i64>) -> SourceResult<Vec<String>> {
        let mut client = self.client.clone();
        let prefix = dir_prefix(path);
        let resp = client
            .get(
                prefix.as_str(),
                Some(get_options(revision).with_prefix().with_keys_only()),
            )
            .await
            .map_err(map_etcd_error)?;

        let mut keys = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            let key = kv
                .key_str()
                .map_err(|e| SourceError::invalid_data(path, e.to_string()))?;
            keys.push(key);
        }
        Ok(collect_children(&prefix, keys))
    }
}

/// Connect to etcd and register the `etcd` scheme on `registry`
pub async fn setup_etcd(registry: &Registry, config: &EtcdConfig) -> Result<()> {
    config.validate()?;
    let source = EtcdSource::connect(config).await?;
    registry.register(SCHEME, Arc::new(DiscoveryProvider::new(source)));
    Ok(())
}

/// Register the `etcd` scheme using an already configured client
pub fn use_existing_etcd(registry: &Registry, client: Client) {
    registry.register(SCHEME, Arc::new(DiscoveryProvider::new(EtcdSource::new(client))));
}
