//! In-memory `StorageClient` for tests and embedded use.
//!
//! Supports per-key failure injection so orchestrator tests can exercise
//! partial-failure semantics without a real backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use cybs3_core::{CybsError, CybsResult};

use crate::client::{ObjectMetadata, RemoteObject, StorageClient};

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    fail_downloads: HashSet<String>,
    fail_uploads: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStorageClient {
    inner: Mutex<Inner>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing failure injection.
    pub fn put(&self, key: &str, data: Vec<u8>) {
        let etag = hex::encode(Sha256::digest(&data));
        self.lock().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                etag,
            },
        );
    }

    /// Make every download of `key` fail with a transfer error.
    pub fn fail_download(&self, key: &str) {
        self.lock().fail_downloads.insert(key.to_string());
    }

    /// Make every upload of `key` fail with a transfer error.
    pub fn fail_upload(&self, key: &str) {
        self.lock().fail_uploads.insert(key.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).map(|o| o.data.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("storage lock poisoned")
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> CybsResult<()> {
        let mut inner = self.lock();
        if inner.fail_uploads.contains(key) {
            return Err(CybsError::Transfer(format!("injected upload failure: {key}")));
        }
        let etag = hex::encode(Sha256::digest(&bytes));
        inner.objects.insert(
            key.to_string(),
            StoredObject {
                data: bytes,
                last_modified: Utc::now(),
                etag,
            },
        );
        Ok(())
    }

    async fn download(&self, key: &str) -> CybsResult<Vec<u8>> {
        let inner = self.lock();
        if inner.fail_downloads.contains(key) {
            return Err(CybsError::Transfer(format!(
                "injected download failure: {key}"
            )));
        }
        inner
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| CybsError::Storage(format!("object not found: {key}")))
    }

    async fn list(&self, prefix: &str) -> CybsResult<Vec<RemoteObject>> {
        let inner = self.lock();
        Ok(inner
            .objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| RemoteObject {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: Some(o.last_modified),
                etag: Some(o.etag.clone()),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> CybsResult<()> {
        self.lock().objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CybsResult<bool> {
        Ok(self.lock().objects.contains_key(key))
    }

    async fn metadata(&self, key: &str) -> CybsResult<ObjectMetadata> {
        let inner = self.lock();
        let obj = inner
            .objects
            .get(key)
            .ok_or_else(|| CybsError::Storage(format!("object not found: {key}")))?;
        Ok(ObjectMetadata {
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
            content_type: None,
            etag: Some(obj.etag.clone()),
        })
    }
}
