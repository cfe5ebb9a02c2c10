//! Literal TCP targets: `tcp://host:port` or `tcp://host/port`

use async_trait::async_trait;
use std::io;
use tokio::net::TcpStream;
use tracing::debug;

use super::{dial, Provider};
use crate::context::Context;
use crate::error::{ConnectError, ConnectResult};
use crate::target::{join_host_port, Target};

/// Scheme the literal TCP provider is registered under
pub const SCHEME: &str = "tcp";

const LOCAL_HOST: &str = "localhost";

/// Dials the host and port spelled out in the target
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProvider;

impl TcpProvider {
    pub fn new() -> Self {
        Self
    }

    /// Derive the `host:port` address to dial.
    ///
    /// A non-empty path is taken as the port (`tcp://[::1]/8080`), otherwise
    /// the authority's port is used. An empty host means the local system.
    pub fn address(target: &Target) -> ConnectResult<String> {
        let host = target
            .hostname()
            .unwrap_or_else(|| LOCAL_HOST.to_string());
        let path = target.path();
        let path_port = path.strip_prefix('/').unwrap_or(&path);

        if !path_port.is_empty() {
            return Ok(join_host_port(&host, path_port));
        }

        match target.port() {
            Some(port) => Ok(join_host_port(&host, port)),
            None => Err(ConnectError::dial(
                target.host().unwrap_or_default(),
                io::Error::new(io::ErrorKind::InvalidInput, "missing port in address"),
            )),
        }
    }
}

#[async_trait]
impl Provider for TcpProvider {
    async fn connect(&self, ctx: &Context, target: &Target) -> ConnectResult<TcpStream> {
        let address = Self::address(target)?;
        debug!(%address, "dialing literal tcp target");
        dial(ctx, &address).await
    }
}
