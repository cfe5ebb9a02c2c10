//! # urlconnect - URL based connection setup
//!
//! Turns a service URL into a live TCP connection. The URL scheme selects a
//! provider; the provider either dials the address spelled out in the URL or
//! looks the service up in a coordination store first.
//!
//! ## Schemes
//!
//! - `tcp://[::1]:8080`, `tcp://[::1]/8080`: dial host and port directly
//! - `etcd:///services/api`: candidates stored in etcd under `/services/api`
//! - `consul:///services/api`: candidates stored in the Consul KV store
//!
//! A discovery path holding a value names one `host:port` candidate. A path
//! with children names one candidate per child. Candidates are tried one at
//! a time in random order until one connects.
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use urlconnect::{config::Config, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file_with_env("urlconnect.toml").await?;
//!     let dispatcher = Dispatcher::new(Arc::new(config.build_registry().await?));
//!     let stream = dispatcher
//!         .connect_timeout("etcd:///services/api", Duration::from_secs(5))
//!         .await?;
//!     println!("connected to {}", stream.peer_addr()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod registry;
pub mod service_discovery;
pub mod target;

// Re-export commonly used types
pub use context::Context;
pub use dispatcher::Dispatcher;
pub use error::{ConnectError, ConnectResult, SourceError, SourceResult};
pub use provider::{DiscoveryProvider, Provider, TcpProvider};
pub use registry::Registry;
pub use service_discovery::{CandidateSource, MemorySource, Node};
pub use target::Target;
