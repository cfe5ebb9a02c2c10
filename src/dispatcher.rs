//! URL dispatch
//!
//! Parses a target URL, picks the provider registered for its scheme and
//! hands over connection setup together with a context. Errors from the
//! provider are returned as they are; nothing is retried here.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::trace;

use crate::context::Context;
use crate::error::{ConnectError, ConnectResult};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::target::Target;

/// Entry point turning URLs into connections
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn resolve(&self, url: &str) -> ConnectResult<(Target, Arc<dyn Provider>)> {
        let target = Target::parse(url)?;
        let provider = self
            .registry
            .lookup(target.scheme())
            .ok_or_else(|| ConnectError::no_handler(target.scheme()))?;
        trace!(%target, "dispatching");
        Ok((target, provider))
    }

    /// Connect to `url` without any deadline.
    ///
    /// `tcp://[::1]:8080` and `tcp://[::1]/8080` both reach port 8080 on the
    /// IPv6 loopback.
    pub async fn connect(&self, url: &str) -> ConnectResult<TcpStream> {
        let (target, provider) = self.resolve(url)?;
        provider.connect(&Context::background(), &target).await
    }

    /// Connect to `url` under the caller's context
    pub async fn connect_context(&self, ctx: &Context, url: &str) -> ConnectResult<TcpStream> {
        let (target, provider) = self.resolve(url)?;
        provider.connect(ctx, &target).await
    }

    /// Connect to `url`, giving up once `timeout` has passed
    pub async fn connect_timeout(&self, url: &str, timeout: Duration) -> ConnectResult<TcpStream> {
        let (target, provider) = self.resolve(url)?;
        let ctx = Context::background().with_timeout(timeout);
        provider.connect_timeout(&ctx, &target, timeout).await
    }
}
