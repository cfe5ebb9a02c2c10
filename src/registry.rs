//! Scheme to provider registry
//!
//! Built by the composition root at startup and shared with dispatchers by
//! handle. Registration may race with lookups; a registration is visible to
//! every lookup that starts after it returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::provider::{Provider, TcpProvider};

/// Mapping from URL scheme to the provider handling it
#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the literal `tcp` provider installed
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(crate::provider::tcp::SCHEME, Arc::new(TcpProvider::new()));
        registry
    }

    /// Install `provider` for `scheme`, replacing any previous provider
    pub fn register<S: Into<String>>(&self, scheme: S, provider: Arc<dyn Provider>) {
        let scheme = scheme.into();
        debug!(%scheme, "registering connection provider");
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, provider);
    }

    /// Provider currently registered for `scheme`
    pub fn lookup(&self, scheme: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scheme)
            .cloned()
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        schemes.sort();
        schemes
    }
}
