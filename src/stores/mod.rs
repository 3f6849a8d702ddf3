//! Store adapters — the boundary to the hosted document and object
//! services.
//!
//! The gallery service only ever talks to these traits, so the backing
//! implementation can be swapped (SQLite + local disk in production,
//! hash-map fakes in tests) without touching the orchestration logic.

use bytes::Bytes;
use std::io;
use thiserror::Error;
use tokio::sync::watch;

pub mod disk_object_store;
#[cfg(test)]
pub mod memory;
pub mod sqlite_document_store;

/// The raw field map of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document change feed closed")]
    FeedClosed,
    #[error("invalid object path `{0}`")]
    InvalidObjectPath(String),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Point read, live subscription, full-document write, and deletion for a
/// single logical document addressed by `(collection, id)`.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the document's fields once. `None` means the document does not
    /// exist, which readers must treat the same as empty.
    async fn read_once(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>>;

    /// Open a live feed of the document's state. The feed starts at the
    /// current state and follows every subsequent write or delete.
    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch>;

    /// Replace the document's fields in full. Creates the document if it
    /// does not exist; last writer wins.
    async fn write(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Delete the document entirely. Deleting an absent document is not an
    /// error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}

/// Binary blob storage keyed by a path string.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing object.
    async fn upload(&self, path: &str, bytes: Bytes) -> StoreResult<StoredObject>;

    /// Public download URL for the object at `path`.
    fn resolve_url(&self, path: &str) -> String;

    /// Read the full object payload.
    async fn read(&self, path: &str) -> StoreResult<Bytes>;

    /// Delete the object at `path`. Missing objects yield
    /// [`StoreError::ObjectNotFound`].
    async fn delete(&self, path: &str) -> StoreResult<()>;
}

/// Metadata for an object that was just written.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub path: String,
    pub size_bytes: i64,
    pub etag: String,
}

/// A live feed of one document's state.
///
/// Backed by a `watch` channel: `current` is always the latest observed
/// state, and intermediate states may coalesce when the consumer lags, the
/// same snapshot semantics the hosted store provides. Dropping the watch
/// ends the subscription.
pub struct DocumentWatch {
    rx: watch::Receiver<Option<Fields>>,
}

impl DocumentWatch {
    pub(crate) fn new(rx: watch::Receiver<Option<Fields>>) -> Self {
        Self { rx }
    }

    /// The most recently observed document state (`None` = absent).
    pub fn current(&self) -> Option<Fields> {
        self.rx.borrow().clone()
    }

    /// Wait for the next state change. Returns `false` once the backing
    /// store has gone away, after which no further states will arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Reject paths that could escape the storage root.
///
/// Rejects empty and overlong paths, leading `/`, any `..` component, and
/// control or backslash bytes.
pub(crate) fn ensure_path_safe(path: &str) -> StoreResult<()> {
    const MAX_OBJECT_PATH_LEN: usize = 1024;

    if path.is_empty() || path.len() > MAX_OBJECT_PATH_LEN {
        return Err(StoreError::InvalidObjectPath(path.to_string()));
    }
    if path.starts_with('/') || path.contains("..") {
        return Err(StoreError::InvalidObjectPath(path.to_string()));
    }
    if path
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StoreError::InvalidObjectPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_safety_rejects_traversal_and_absolute_paths() {
        assert!(ensure_path_safe("gallery/1_a.jpg").is_ok());
        assert!(ensure_path_safe("gallery/nested/a.jpg").is_ok());
        assert!(ensure_path_safe("").is_err());
        assert!(ensure_path_safe("/etc/passwd").is_err());
        assert!(ensure_path_safe("gallery/../secret").is_err());
        assert!(ensure_path_safe("gallery/a\\b").is_err());
        assert!(ensure_path_safe("gallery/a\0b").is_err());
    }
}
