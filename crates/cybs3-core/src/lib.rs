//! cybs3-core: shared types for the CYBS3 backup pipeline
//!
//! Holds the error taxonomy, the backup configuration schema, the
//! retention policy decision function, and the audit event model that
//! every other crate in the workspace builds on.

pub mod audit;
pub mod config;
pub mod error;
pub mod retention;

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::{BackupConfiguration, ProviderDescriptor, StorageTarget};
pub use error::{CybsError, CybsResult};
pub use retention::RetentionPolicy;
