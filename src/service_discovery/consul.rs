//! Consul KV candidate source
//!
//! Reads candidates from the Consul key/value HTTP API. Consul has no
//! point-in-time reads, so every lookup sees the latest state.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::service_discovery::ConsulConfig;
use crate::error::{SourceError, SourceResult};
use crate::provider::DiscoveryProvider;
use crate::registry::Registry;
use crate::service_discovery::traits::{collect_children, dir_prefix, CandidateSource, Node};

/// Scheme the Consul provider is registered under
pub const SCHEME: &str = "consul";

/// Characters escaped in a single key segment of a KV request path
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Candidate source reading from the Consul KV store
#[derive(Clone)]
pub struct ConsulSource {
    client: reqwest::Client,
    address: String,
    token: Option<String>,
    datacenter: Option<String>,
}

impl std::fmt::Debug for ConsulSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulSource")
            .field("address", &self.address)
            .field("datacenter", &self.datacenter)
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

/// One entry of a `GET /v1/kv/<key>` response
#[derive(Debug, Deserialize)]
struct KvEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Option<String>,
}

impl ConsulSource {
    /// Wrap an existing HTTP client talking to the agent at `address`
    pub fn new<S: Into<String>>(client: reqwest::Client, address: S) -> Self {
        Self {
            client,
            address: address.into().trim_end_matches('/').to_string(),
            token: None,
            datacenter: None,
        }
    }

    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_datacenter<S: Into<String>>(mut self, datacenter: S) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Build a client from `config`, loading TLS material when configured
    pub async fn connect(config: &ConsulConfig) -> Result<Self> {
        let mut builder = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout());

        if let Some(files) = config.tls_files() {
            let material = files.load().await?;
            let mut pem = material.cert;
            pem.push(b'\n');
            pem.extend_from_slice(&material.key);
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
            if let Some(ca) = material.ca {
                builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&ca)?);
            }
        }

        let mut source = Self::new(builder.build()?, config.address.clone());
        source.token = config.token.clone();
        source.datacenter = config.datacenter.clone();
        debug!(address = %source.address, "Configured Consul KV client");
        Ok(source)
    }

    fn kv_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
            .collect();
        format!("{}/v1/kv/{}", self.address, encoded.join("/"))
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("X-Consul-Token", token);
        }
        if let Some(dc) = &self.datacenter {
            request = request.query(&[("dc", dc.as_str())]);
        }
        request
    }

    /// Full keys directly below `path`, `None` when there are none
    async fn keys_below(&self, path: &str) -> SourceResult<Option<Vec<String>>> {
        let prefix = dir_prefix(path);
        let response = self
            .get(&self.kv_url(&prefix))
            .query(&[("keys", ""), ("separator", "/")])
            .send()
            .await
            .map_err(|e| SourceError::transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let keys: Vec<String> = response
                    .json()
                    .await
                    .map_err(|e| SourceError::invalid_data(path, e.to_string()))?;
                Ok(Some(keys))
            }
            status => Err(SourceError::backend(format!(
                "listing {} returned HTTP {}",
                path, status
            ))),
        }
    }
}

fn decode_value(path: &str, entry: &KvEntry) -> SourceResult<String> {
    let Some(encoded) = entry.value.as_deref() else {
        return Ok(String::new());
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| SourceError::invalid_data(path, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SourceError::invalid_data(path, e.to_string()))
}

#[async_trait]
impl CandidateSource for ConsulSource {
    fn name(&self) -> &'static str {
        "consul"
    }

    async fn read(&self, path: &str, _revision: Option<i64>) -> SourceResult<Node> {
        let response = self
            .get(&self.kv_url(path))
            .send()
            .await
            .map_err(|e| SourceError::transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                trace!(path, "no Consul key, checking for children");
                let keys = self.keys_below(path).await?.unwrap_or_default();
                let children = collect_children(&prefix_of(path), keys.iter().map(String::as_str));
                if children.is_empty() {
                    Err(SourceError::not_found(path))
                } else {
                    Ok(Node::Directory)
                }
            }
            status if status.is_success() => {
                let entries: Vec<KvEntry> = response
                    .json()
                    .await
                    .map_err(|e| SourceError::invalid_data(path, e.to_string()))?;
                let entry = entries
                    .first()
                    .ok_or_else(|| SourceError::not_found(path))?;
                trace!(path, key = %entry.key, "read Consul key");
                Ok(Node::Leaf(decode_value(path, entry)?))
            }
            status => Err(SourceError::backend(format!(
                "reading {} returned HTTP {}",
                path, status
            ))),
        }
    }

    async fn list_children(&self, path: &str, _revision: Option<i64>) -> SourceResult<Vec<String>> {
        let keys = self
            .keys_below(path)
            .await?
            .ok_or_else(|| SourceError::not_found(path))?;
        Ok(collect_children(
            &prefix_of(path),
            keys.iter().map(String::as_str),
        ))
    }
}

/// Consul keys carry no leading slash
fn prefix_of(path: &str) -> String {
    dir_prefix(path.trim_start_matches('/'))
}

/// Build a Consul client and register the `consul` scheme on `registry`
pub async fn setup_consul(registry: &Registry, config: &ConsulConfig) -> Result<()> {
    config.validate()?;
    let source = ConsulSource::connect(config).await?;
    registry.register(SCHEME, Arc::new(DiscoveryProvider::new(source)));
    Ok(())
}

/// Register the `consul` scheme using an already configured source
pub fn use_existing_consul(registry: &Registry, source: ConsulSource) {
    registry.register(SCHEME, Arc::new(DiscoveryProvider::new(source)));
}
