//! Candidate sources
//!
//! Backends that store the `host:port` candidates of a service:
//! - etcd: v3 key space, snapshot reads pinned to one revision
//! - Consul: KV HTTP API
//! - memory: in-process store for tests and embedding

#[cfg(feature = "consul-discovery")]
pub mod consul;
#[cfg(feature = "etcd-discovery")]
pub mod etcd;
pub mod memory;
pub mod traits;


pub use memory::MemorySource;
pub use traits::{CandidateSource, Node};

#[cfg(feature = "consul-discovery")]
pub use consul::{setup_consul, use_existing_consul, ConsulSource};

#[cfg(feature = "etcd-discovery")]
pub use etcd::{setup_etcd, use_existing_etcd, EtcdSource};
