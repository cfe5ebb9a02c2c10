//! Core traits and types for candidate sources
//!
//! A candidate source is a hierarchical key/value store in which services
//! publish their `host:port` endpoints. A path either holds a value (a leaf)
//! or has children (a directory); each child of a directory holds one
//! candidate.

use async_trait::async_trait;

use crate::error::SourceResult;

/// What is stored at a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The path holds a value
    Leaf(String),
    /// The path has children instead of a value
    Directory,
}

/// Read-only view of a discovery backend
///
/// Every method takes an optional revision. When the backend supports
/// point-in-time reads, passing the revision returned by
/// [`CandidateSource::current_revision`] makes all reads of one lookup agree.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Backend name used in error messages and logs
    fn name(&self) -> &'static str;

    /// Revision to pin for a lookup of `path`
    ///
    /// Backends without snapshot reads return `None`, meaning "latest".
    async fn current_revision(&self, _path: &str) -> SourceResult<Option<i64>> {
        Ok(None)
    }

    /// Read the node at `path`; an absent path is an error
    async fn read(&self, path: &str, revision: Option<i64>) -> SourceResult<Node>;

    /// Names of the immediate children of the directory at `path`
    async fn list_children(&self, path: &str, revision: Option<i64>) -> SourceResult<Vec<String>>;
}

/// Path of child `name` below `parent`
pub fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// Prefix shared by every key below the directory at `path`
pub fn dir_prefix(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

/// First path segment of `key` below `prefix`, if `key` lies under it
pub fn immediate_child<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    let name = rest.split('/').next().unwrap_or(rest);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Collect distinct immediate child names in first-seen order
pub fn collect_children<'a, I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = Vec::new();
    for key in keys {
        if let Some(name) = immediate_child(prefix, key) {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/services/api", "a"), "/services/api/a");
        assert_eq!(child_path("/services/api/", "a"), "/services/api/a");
    }

    #[test]
    fn test_immediate_child() {
        let prefix = dir_prefix("/services/api");
        assert_eq!(prefix, "/services/api/");
        assert_eq!(immediate_child(&prefix, "/services/api/a"), Some("a"));
        assert_eq!(immediate_child(&prefix, "/services/api/b/c"), Some("b"));
        assert_eq!(immediate_child(&prefix, "/services/api/"), None);
        assert_eq!(immediate_child(&prefix, "/services/apix"), None);
    }

    #[test]
    fn test_collect_children_dedups_in_order() {
        let names = collect_children(
            "/s/",
            ["/s/a", "/s/a.b", "/s/a/x", "/s/c", "/s/a.b"],
        );
        assert_eq!(names, vec!["a", "a.b", "c"]);
    }
}
