//! Backup job model and state machine.
//!
//! ```text
//! pending → running → completed
//!              ├────→ failed
//!              └────→ cancelled
//! ```
//!
//! The three right-hand states are terminal; no transition re-enters
//! `running`. A job is created per backup invocation, mutated only by
//! the orchestrator that owns it, and garbage-collected by retention
//! cleanup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupProgress {
    pub objects_total: u64,
    pub objects_processed: u64,
    pub bytes_total: u64,
    /// Bytes actually backed up (failed objects don't count)
    pub bytes_processed: u64,
    pub current_operation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: Uuid,
    pub configuration_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: BackupProgress,
    /// Non-empty whenever status is `Failed`
    pub error: Option<String>,
}

impl BackupJob {
    pub fn new(configuration_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            configuration_id,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: BackupProgress::default(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = BackupJob::new(Uuid::new_v4());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.error.is_none());
        assert_eq!(job.progress.objects_processed, 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
