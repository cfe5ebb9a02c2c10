//! In-process candidate source
//!
//! Keeps recent revisions of a small key space so lookups can be pinned to a
//! snapshot the same way etcd lookups are. Clones share the same store.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{SourceError, SourceResult};
use crate::service_discovery::traits::{collect_children, dir_prefix, CandidateSource, Node};

type Snapshot = BTreeMap<String, String>;

/// Revisions kept by default before older ones are compacted away
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

#[derive(Debug)]
struct History {
    // revision of the front snapshot
    oldest: i64,
    snapshots: VecDeque<Arc<Snapshot>>,
    limit: usize,
}

impl History {
    fn latest(&self) -> i64 {
        self.oldest + self.snapshots.len() as i64 - 1
    }

    fn get(&self, revision: i64) -> Option<Arc<Snapshot>> {
        let index = usize::try_from(revision.checked_sub(self.oldest)?).ok()?;
        self.snapshots.get(index).cloned()
    }
}

/// Candidate source backed by an in-memory revision history
#[derive(Debug, Clone)]
pub struct MemorySource {
    history: Arc<RwLock<History>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Keep at most `limit` revisions (at least one). Reads pinned to an
    /// older revision fail like reads of a compacted etcd revision.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history: Arc::new(RwLock::new(History {
                oldest: 0,
                snapshots: VecDeque::from([Arc::new(Snapshot::new())]),
                limit: limit.max(1),
            })),
        }
    }

    /// Store `value` at `key`, returning the new revision
    pub fn put<K: Into<String>, V: Into<String>>(&self, key: K, value: V) -> i64 {
        let key = key.into();
        let value = value.into();
        self.update(move |snapshot| {
            snapshot.insert(key, value);
        })
    }

    /// Remove `key`, returning the new revision
    pub fn delete(&self, key: &str) -> i64 {
        self.update(|snapshot| {
            snapshot.remove(key);
        })
    }

    /// Latest revision
    pub fn revision(&self) -> i64 {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.latest()
    }

    /// Oldest revision still readable
    pub fn oldest_revision(&self) -> i64 {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.oldest
    }

    fn update<F: FnOnce(&mut Snapshot)>(&self, change: F) -> i64 {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = history
            .snapshots
            .back()
            .map(|latest| (**latest).clone())
            .unwrap_or_default();
        change(&mut next);
        history.snapshots.push_back(Arc::new(next));
        while history.snapshots.len() > history.limit {
            history.snapshots.pop_front();
            history.oldest += 1;
        }
        history.latest()
    }

    fn snapshot(&self, revision: Option<i64>) -> SourceResult<Arc<Snapshot>> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let revision = revision.unwrap_or_else(|| history.latest());
        if let Some(snapshot) = history.get(revision) {
            return Ok(snapshot);
        }
        if revision < history.oldest {
            Err(SourceError::backend(format!(
                "revision {} has been compacted, oldest is {}",
                revision, history.oldest
            )))
        } else {
            Err(SourceError::backend(format!(
                "revision {} is not available",
                revision
            )))
        }
    }
}

#[async_trait]
impl CandidateSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn current_revision(&self, _path: &str) -> SourceResult<Option<i64>> {
        Ok(Some(self.revision()))
    }

    async fn read(&self, path: &str, revision: Option<i64>) -> SourceResult<Node> {
        let snapshot = self.snapshot(revision)?;
        if let Some(value) = snapshot.get(path) {
            return Ok(Node::Leaf(value.clone()));
        }

        let prefix = dir_prefix(path);
        if snapshot.keys().any(|key| key.starts_with(&prefix)) {
            Ok(Node::Directory)
        } else {
            Err(SourceError::not_found(path))
        }
    }

    async fn list_children(&self, path: &str, revision: Option<i64>) -> SourceResult<Vec<String>> {
        let snapshot = self.snapshot(revision)?;
        let prefix = dir_prefix(path);
        Ok(collect_children(
            &prefix,
            snapshot.keys().map(String::as_str),
        ))
    }
}
