//! Disk-backed object store.
//!
//! Payloads live beneath `base_path/<path>` exactly as addressed, written
//! durably (temp file + fsync + atomic rename) so a crash never leaves a
//! half-written object at its final path. URLs resolve against the
//! configured public base, under the `/media` route served by this process.

use crate::stores::{ObjectStore, StoreError, StoreResult, StoredObject, ensure_path_safe};
use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct DiskObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl DiskObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait::async_trait]
impl ObjectStore for DiskObjectStore {
    async fn upload(&self, path: &str, bytes: Bytes) -> StoreResult<StoredObject> {
        ensure_path_safe(path)?;
        let file_path = self.object_path(path);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::InvalidObjectPath(path.to_string()))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_durably(&mut file, &bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        debug!("stored object {path} ({} bytes)", bytes.len());
        Ok(StoredObject {
            path: path.to_string(),
            size_bytes: bytes.len() as i64,
            etag: format!("{:x}", md5::compute(&bytes)),
        })
    }

    fn resolve_url(&self, path: &str) -> String {
        format!("{}/media/{}", self.public_base_url.trim_end_matches('/'), path)
    }

    async fn read(&self, path: &str) -> StoreResult<Bytes> {
        ensure_path_safe(path)?;
        match fs::read(self.object_path(path)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound(path.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        ensure_path_safe(path)?;
        let file_path = self.object_path(path);
        match fs::remove_file(&file_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(path.to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        // Prune now-empty directories up to the storage root.
        let mut current = file_path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if !dir.starts_with(&self.base_path) || dir == self.base_path {
                break;
            }
            match fs::remove_dir(&dir).await {
                Ok(()) => current = dir.parent().map(Path::to_path_buf),
                Err(_) => break,
            }
        }
        Ok(())
    }
}

async fn write_durably(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
