//! cybs3-backup: policy-driven backup jobs over pluggable storage
//!
//! The orchestrator owns a job table, runs each backup as one
//! independently cancellable task, appends every state transition and
//! object-level failure to an `AuditSink`, and prunes completed jobs by
//! retention policy.

pub mod job;
pub mod manifest;
pub mod orchestrator;

pub use job::{BackupJob, BackupProgress, JobStatus};
pub use manifest::{BackupManifest, BackupObject, BackupStatistics, SourceDescriptor};
pub use orchestrator::BackupOrchestrator;
