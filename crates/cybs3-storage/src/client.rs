//! The `StorageClient` capability and its record types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cybs3_core::{CybsResult, StorageTarget};

/// One object in a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Per-object metadata from a stat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Narrow capability over one bucket of one provider.
///
/// Explicit `CybsResult` returns on every call; no exceptions-as-control-flow
/// crosses this boundary. Timeouts and retries, if any, belong to the
/// implementation behind the trait.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> CybsResult<()>;
    async fn download(&self, key: &str) -> CybsResult<Vec<u8>>;
    async fn list(&self, prefix: &str) -> CybsResult<Vec<RemoteObject>>;
    async fn delete(&self, key: &str) -> CybsResult<()>;
    async fn exists(&self, key: &str) -> CybsResult<bool>;
    async fn metadata(&self, key: &str) -> CybsResult<ObjectMetadata>;
}

/// Opens `StorageClient` handles from configuration descriptors.
///
/// The orchestrator holds one factory and opens source/destination
/// handles per job.
pub trait StorageClientFactory: Send + Sync {
    fn client(&self, target: &StorageTarget) -> CybsResult<std::sync::Arc<dyn StorageClient>>;
}
