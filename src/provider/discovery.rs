//! Discovery-backed provider
//!
//! Looks up the candidates stored at the target's path and dials them one
//! after another in a fresh random order until one connects. The lookup and
//! dial logic is shared by every [`CandidateSource`] backend.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{dial, Provider};
use crate::context::Context;
use crate::error::{ConnectError, ConnectResult, SourceResult};
use crate::service_discovery::traits::{child_path, CandidateSource, Node};
use crate::target::Target;

/// Provider resolving targets through a candidate source
#[derive(Debug)]
pub struct DiscoveryProvider<S> {
    source: S,
    seed: Option<u64>,
}

impl<S: CandidateSource> DiscoveryProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source, seed: None }
    }

    /// Shuffle candidates with a fixed seed instead of thread-local entropy.
    /// Every call then tries candidates in the same order.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Read the candidates stored at `path`.
    ///
    /// A leaf yields its own value; a directory yields the value of each
    /// immediate child. All reads use the same revision. Any read failure
    /// aborts the lookup. Blank values and nested directories are skipped.
    pub async fn lookup(&self, ctx: &Context, path: &str) -> ConnectResult<Vec<String>> {
        ctx.run(async {
            self.read_candidates(path)
                .await
                .map_err(|e| ConnectError::discovery(self.source.name(), path, e))
        })
        .await
    }

    async fn read_candidates(&self, path: &str) -> SourceResult<Vec<String>> {
        let revision = self.source.current_revision(path).await?;
        trace!(backend = self.source.name(), path, ?revision, "looking up candidates");

        let names = match self.source.read(path, revision).await? {
            Node::Leaf(value) => return Ok(non_blank(value).into_iter().collect()),
            Node::Directory => self.source.list_children(path, revision).await?,
        };

        let mut candidates = Vec::with_capacity(names.len());
        for name in names {
            let child = child_path(path, &name);
            match self.source.read(&child, revision).await? {
                Node::Leaf(value) => candidates.extend(non_blank(value)),
                Node::Directory => trace!(path = %child, "skipping nested directory"),
            }
        }
        Ok(candidates)
    }

    fn shuffle(&self, candidates: &mut [String]) {
        match self.seed {
            Some(seed) => candidates.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => candidates.shuffle(&mut rand::thread_rng()),
        }
    }

    /// Dial `candidates` sequentially in random order.
    ///
    /// Returns the first connection made. When every attempt fails the last
    /// dial error is returned; an ended context stops further attempts.
    /// `attempt_timeout` additionally bounds each single attempt.
    pub async fn dial_candidates(
        &self,
        ctx: &Context,
        path: &str,
        mut candidates: Vec<String>,
        attempt_timeout: Option<Duration>,
    ) -> ConnectResult<TcpStream> {
        if candidates.is_empty() {
            return Err(ConnectError::no_candidates(path));
        }
        self.shuffle(&mut candidates);

        let mut last_error = None;
        for candidate in &candidates {
            let attempt = match attempt_timeout {
                Some(timeout) => ctx.with_timeout(timeout),
                None => ctx.clone(),
            };
            match dial(&attempt, candidate).await {
                Ok(stream) => {
                    debug!(path, %candidate, "connected to candidate");
                    return Ok(stream);
                }
                Err(e) if ctx.is_done() => return Err(ctx.err().unwrap_or(e)),
                Err(e) => {
                    debug!(path, %candidate, error = %e, "candidate failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ConnectError::no_candidates(path)))
    }

    async fn resolve(
        &self,
        ctx: &Context,
        target: &Target,
        attempt_timeout: Option<Duration>,
    ) -> ConnectResult<TcpStream> {
        let path = target.path();
        let candidates = self.lookup(ctx, &path).await?;
        self.dial_candidates(ctx, &path, candidates, attempt_timeout)
            .await
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[async_trait]
impl<S: CandidateSource> Provider for DiscoveryProvider<S> {
    async fn connect(&self, ctx: &Context, target: &Target) -> ConnectResult<TcpStream> {
        self.resolve(ctx, target, None).await
    }

    /// Each dial attempt gets at most `timeout`; the lookup and the attempts
    /// together stay within whatever deadline `ctx` carries.
    async fn connect_timeout(
        &self,
        ctx: &Context,
        target: &Target,
        timeout: Duration,
    ) -> ConnectResult<TcpStream> {
        self.resolve(ctx, target, Some(timeout)).await
    }
}
