//! SQLite-backed document store.
//!
//! Documents live in one `documents` table keyed by `(collection, doc_id)`
//! with the field map serialized as JSON text. Every write replaces the
//! full field map (upsert); there is no field-level update. Change feeds
//! are `watch` channels kept per document address and published to under
//! the registry lock, so a feed's state never runs ahead of the table.

use crate::stores::{DocumentStore, DocumentWatch, Fields, StoreResult};
use chrono::Utc;
use sqlx::SqlitePool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, watch};
use tracing::debug;

type ChannelMap = HashMap<(String, String), watch::Sender<Option<Fields>>>;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Arc<SqlitePool>,
    channels: Arc<Mutex<ChannelMap>>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create the `documents` table if it does not exist yet.
    ///
    /// The schema is embedded so tests against in-memory databases can run
    /// it without a working directory.
    pub async fn migrate(&self) -> StoreResult<()> {
        let sql = include_str!("../../migrations/0001_init.sql");
        for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            debug!("executing migration statement: {stmt}");
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn load(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT fields FROM documents WHERE collection = ? AND doc_id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        match row {
            Some((raw,)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Get or lazily create the change channel for an address. New channels
    /// are seeded from the table so the first observed state is the real
    /// current state, not a stale default.
    async fn channel(
        &self,
        channels: &mut ChannelMap,
        collection: &str,
        id: &str,
    ) -> StoreResult<watch::Sender<Option<Fields>>> {
        let key = (collection.to_string(), id.to_string());
        if let Some(tx) = channels.get(&key) {
            return Ok(tx.clone());
        }
        let initial = self.load(collection, id).await?;
        let (tx, _rx) = watch::channel(initial);
        channels.insert(key, tx.clone());
        Ok(tx)
    }
}

#[async_trait::async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn read_once(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        self.load(collection, id).await
    }

    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch> {
        let mut channels = self.channels.lock().await;
        let tx = self.channel(&mut channels, collection, id).await?;
        Ok(DocumentWatch::new(tx.subscribe()))
    }

    async fn write(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        // Hold the registry lock across write + publish so feed order
        // matches table order.
        let mut channels = self.channels.lock().await;
        let tx = self.channel(&mut channels, collection, id).await?;

        let raw = serde_json::to_string(&fields)?;
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, fields, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(collection, doc_id) DO UPDATE SET
                 fields = excluded.fields,
                 updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&raw)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        tx.send_replace(Some(fields));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut channels = self.channels.lock().await;
        let tx = self.channel(&mut channels, collection, id).await?;

        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            debug!("document {collection}/{id} already absent");
        }

        tx.send_replace(None);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
