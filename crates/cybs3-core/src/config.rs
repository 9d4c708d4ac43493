use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CybsError, CybsResult};
use crate::retention::RetentionPolicy;

/// Describes one object-storage provider endpoint.
///
/// The wire-level REST protocol behind a provider is out of scope here;
/// this descriptor is only what a `StorageClient` factory needs to open
/// a handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDescriptor {
    /// Provider kind, e.g. "s3" or "memory" (tests)
    pub provider: String,
    /// Endpoint URL
    pub endpoint: String,
    /// Region (default: us-east-1)
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Reject plaintext HTTP endpoints
    pub enforce_tls: bool,
}

impl Default for ProviderDescriptor {
    fn default() -> Self {
        Self {
            provider: "s3".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            enforce_tls: false,
        }
    }
}

/// A bucket (plus optional key prefix) on some provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageTarget {
    pub provider: ProviderDescriptor,
    pub bucket: String,
    /// Key prefix to list/write under (no trailing slash)
    pub prefix: Option<String>,
}

/// One backup configuration: where to read, where to write, and the
/// policies that govern the job.
///
/// Configurations are long-lived and externally managed; the
/// orchestrator consumes them read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfiguration {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub source: StorageTarget,
    pub destination: StorageTarget,
    /// Cron expression consumed by an external scheduler
    pub schedule: Option<String>,
    pub retention: RetentionPolicy,
    pub compression_enabled: bool,
    pub encryption_enabled: bool,
    /// Prefix for backup object keys in the destination bucket
    pub key_prefix: Option<String>,
    /// Keep at most this many completed backups (0 = uncapped)
    pub max_backups: u32,
}

impl Default for BackupConfiguration {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            enabled: true,
            source: StorageTarget::default(),
            destination: StorageTarget::default(),
            schedule: None,
            retention: RetentionPolicy::default(),
            compression_enabled: false,
            encryption_enabled: false,
            key_prefix: None,
            max_backups: 0,
        }
    }
}

impl BackupConfiguration {
    /// Parse a configuration from TOML. Unset fields take their defaults.
    pub fn from_toml_str(raw: &str) -> CybsResult<Self> {
        toml::from_str(raw).map_err(|e| CybsError::Configuration(format!("parsing config: {e}")))
    }
}
