//! In-memory store fakes for tests.
//!
//! Both fakes honor the adapter contracts exactly, plus a switchable
//! failure mode so soft-fail behavior can be exercised without a real
//! backend going down.

use crate::stores::{
    DocumentStore, DocumentWatch, Fields, ObjectStore, StoreError, StoreResult, StoredObject,
    ensure_path_safe,
};
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::{Mutex, watch};

#[derive(Default)]
pub struct MemoryDocumentStore {
    channels: Mutex<HashMap<(String, String), watch::Sender<Option<Fields>>>>,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent operation fail as if the backend were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store failing".into()))
        } else {
            Ok(())
        }
    }

    async fn channel(&self, collection: &str, id: &str) -> watch::Sender<Option<Fields>> {
        let mut channels = self.channels.lock().await;
        channels
            .entry((collection.to_string(), id.to_string()))
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read_once(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        self.check_available()?;
        Ok(self.channel(collection, id).await.borrow().clone())
    }

    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch> {
        self.check_available()?;
        Ok(DocumentWatch::new(self.channel(collection, id).await.subscribe()))
    }

    async fn write(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.check_available()?;
        self.channel(collection, id).await.send_replace(Some(fields));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check_available()?;
        self.channel(collection, id).await.send_replace(None);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Bytes) -> StoreResult<StoredObject> {
        ensure_path_safe(path)?;
        let stored = StoredObject {
            path: path.to_string(),
            size_bytes: bytes.len() as i64,
            etag: format!("{:x}", md5::compute(&bytes)),
        };
        self.objects.lock().await.insert(path.to_string(), bytes);
        Ok(stored)
    }

    fn resolve_url(&self, path: &str) -> String {
        format!("memory://media/{path}")
    }

    async fn read(&self, path: &str) -> StoreResult<Bytes> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.objects
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::ObjectNotFound(path.to_string()))
    }
}
