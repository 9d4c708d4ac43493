//! OpenDAL-backed `StorageClient` for S3-compatible endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opendal::Operator;

use cybs3_core::{CybsError, CybsResult, ProviderDescriptor, StorageTarget};

use crate::client::{ObjectMetadata, RemoteObject, StorageClient, StorageClientFactory};

/// Build an OpenDAL Operator for an S3-compatible endpoint.
///
/// Path-style addressing (the opendal default) is kept; MinIO and
/// SeaweedFS require it. If `enforce_tls` is set and the endpoint uses
/// plaintext HTTP, construction fails.
pub fn build_operator(provider: &ProviderDescriptor, bucket: &str) -> CybsResult<Operator> {
    if provider.endpoint.starts_with("http://") {
        if provider.enforce_tls {
            return Err(CybsError::Configuration(format!(
                "endpoint {} uses plaintext HTTP but enforce_tls is enabled",
                provider.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %provider.endpoint,
            "endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
        );
    }

    let builder = opendal::services::S3::default()
        .endpoint(&provider.endpoint)
        .region(&provider.region)
        .bucket(bucket)
        .access_key_id(&provider.access_key_id)
        .secret_access_key(&provider.secret_access_key);

    let op = Operator::new(builder)
        .map_err(|e| CybsError::Storage(format!("creating S3 operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// `StorageClient` over any OpenDAL operator.
pub struct OpendalStorageClient {
    op: Operator,
}

impl OpendalStorageClient {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }
}

fn storage_err(action: &str, key: &str, e: opendal::Error) -> CybsError {
    CybsError::Storage(format!("{action} {key}: {e}"))
}

/// Opendal reports modification times as its own `Timestamp`; the rest
/// of the workspace speaks `chrono`.
fn last_modified(meta: &opendal::Metadata) -> Option<DateTime<Utc>> {
    meta.last_modified()
        .map(|t| t.into_inner())
        .and_then(|t| DateTime::from_timestamp(t.as_second(), t.subsec_nanosecond() as u32))
}

#[async_trait]
impl StorageClient for OpendalStorageClient {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> CybsResult<()> {
        self.op
            .write(key, bytes)
            .await
            .map_err(|e| storage_err("uploading", key, e))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> CybsResult<Vec<u8>> {
        let buffer = self
            .op
            .read(key)
            .await
            .map_err(|e| storage_err("downloading", key, e))?;
        Ok(buffer.to_bytes().to_vec())
    }

    async fn list(&self, prefix: &str) -> CybsResult<Vec<RemoteObject>> {
        let entries = self
            .op
            .list_with(prefix)
            .recursive(true)
            .await
            .map_err(|e| storage_err("listing", prefix, e))?;

        Ok(entries
            .into_iter()
            .filter(|e| !e.metadata().mode().is_dir())
            .map(|e| {
                let meta = e.metadata();
                RemoteObject {
                    key: e.path().to_string(),
                    size: meta.content_length(),
                    last_modified: last_modified(meta),
                    etag: meta.etag().map(|s| s.trim_matches('"').to_string()),
                }
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> CybsResult<()> {
        self.op
            .delete(key)
            .await
            .map_err(|e| storage_err("deleting", key, e))
    }

    async fn exists(&self, key: &str) -> CybsResult<bool> {
        self.op
            .exists(key)
            .await
            .map_err(|e| storage_err("checking", key, e))
    }

    async fn metadata(&self, key: &str) -> CybsResult<ObjectMetadata> {
        let meta = self
            .op
            .stat(key)
            .await
            .map_err(|e| storage_err("stating", key, e))?;
        Ok(ObjectMetadata {
            size: meta.content_length(),
            last_modified: last_modified(&meta),
            content_type: meta.content_type().map(|s| s.to_string()),
            etag: meta.etag().map(|s| s.trim_matches('"').to_string()),
        })
    }
}

/// Factory producing OpenDAL clients from provider descriptors.
///
/// `provider = "memory"` yields an in-process operator, used by tests
/// and local dry runs.
#[derive(Default)]
pub struct OpendalFactory;

impl StorageClientFactory for OpendalFactory {
    fn client(&self, target: &StorageTarget) -> CybsResult<std::sync::Arc<dyn StorageClient>> {
        let op = match target.provider.provider.as_str() {
            "memory" => Operator::new(opendal::services::Memory::default())
                .map_err(|e| CybsError::Storage(format!("creating memory operator: {e}")))?
                .finish(),
            "s3" => build_operator(&target.provider, &target.bucket)?,
            other => {
                return Err(CybsError::Configuration(format!(
                    "unknown storage provider: {other}"
                )))
            }
        };
        Ok(std::sync::Arc::new(OpendalStorageClient::new(op)))
    }
}
