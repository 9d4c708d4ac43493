//! Backup manifests: the immutable record of what a completed job
//! transferred. Built once at job completion, serialized as JSON to the
//! destination bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use cybs3_core::{CybsError, CybsResult};

/// Where a backup came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub provider: String,
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: String,
}

/// One object captured by a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupObject {
    /// Original key in the source bucket
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    /// Backup-specific metadata: generated backup key, compression and
    /// encryption flags, and the plaintext chunk size for encrypted
    /// objects (needed to set the decoder's expected frame size).
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStatistics {
    /// Objects successfully backed up
    pub total_objects: u64,
    /// Bytes successfully backed up
    pub total_size: u64,
    pub failed_objects: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub throughput_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub id: Uuid,
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: SourceDescriptor,
    pub objects: Vec<BackupObject>,
    pub statistics: BackupStatistics,
}

impl BackupManifest {
    pub fn to_bytes(&self) -> CybsResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CybsError::Storage(format!("serializing manifest: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> CybsResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| CybsError::Storage(format!("parsing manifest: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_roundtrip() {
        let manifest = BackupManifest {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: SourceDescriptor {
                provider: "s3".into(),
                bucket: "prod-data".into(),
                prefix: Some("documents".into()),
                region: "us-east-1".into(),
            },
            objects: vec![BackupObject {
                key: "documents/report.pdf".into(),
                size: 4096,
                last_modified: Some(Utc::now()),
                etag: Some("abc123".into()),
                metadata: HashMap::from([
                    ("backup-key".to_string(), "2026-08-30-03-00-00/documents/report.pdf".to_string()),
                    ("encrypted".to_string(), "true".to_string()),
                    ("chunk-size".to_string(), "262144".to_string()),
                ]),
            }],
            statistics: BackupStatistics {
                total_objects: 1,
                total_size: 4096,
                failed_objects: 0,
                start_time: Utc::now(),
                end_time: Utc::now(),
                throughput_bytes_per_sec: 4096.0,
            },
        };

        let bytes = manifest.to_bytes().unwrap();
        let parsed = BackupManifest::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.job_id, manifest.job_id);
        assert_eq!(parsed.objects.len(), 1);
        assert_eq!(parsed.objects[0].metadata.get("chunk-size").unwrap(), "262144");
        assert_eq!(parsed.statistics.failed_objects, 0);
    }

    #[test]
    fn test_malformed_manifest_rejected() {
        assert!(BackupManifest::from_bytes(b"not json").is_err());
    }
}
