//! Connection providers
//!
//! A provider turns a [`Target`] of one URL scheme into a live TCP connection.
//! - `tcp`: the target names the host and port directly
//! - `discovery`: candidates are looked up in a coordination store and
//!   dialed in random order until one answers

pub mod discovery;
pub mod tcp;

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::context::Context;
use crate::error::ConnectResult;
use crate::target::Target;

pub use discovery::DiscoveryProvider;
pub use tcp::TcpProvider;

/// Connection setup strategy registered under a URL scheme
#[async_trait]
pub trait Provider: Send + Sync {
    /// Establish a connection, bounded only by what `ctx` carries
    async fn connect(&self, ctx: &Context, target: &Target) -> ConnectResult<TcpStream>;

    /// Establish a connection, giving up after `timeout` at the latest
    async fn connect_timeout(
        &self,
        ctx: &Context,
        target: &Target,
        timeout: Duration,
    ) -> ConnectResult<TcpStream> {
        self.connect(&ctx.with_timeout(timeout), target).await
    }
}

/// Dial one `host:port` candidate under `ctx`
pub(crate) async fn dial(ctx: &Context, address: &str) -> ConnectResult<TcpStream> {
    ctx.run(async {
        TcpStream::connect(address)
            .await
            .map_err(|e| crate::error::ConnectError::dial(address, e))
    })
    .await
}
