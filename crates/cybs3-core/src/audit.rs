//! Audit trail model and sink capability.
//!
//! Every job state transition, per-object failure, and retention
//! deletion in the orchestrator is appended to an `AuditSink`. Sink
//! errors propagate synchronously to the operation that triggered them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::CybsResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub actor: String,
    pub resource: String,
    pub action: String,
    /// "success" or "failure"
    pub result: String,
    pub metadata: HashMap<String, String>,
    pub source: String,
    pub session_id: Option<String>,
    pub compliance_tags: Vec<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str, resource: &str, action: &str, result: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            actor: "backup-orchestrator".to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            result: result.to_string(),
            metadata: HashMap::new(),
            source: "cybs3".to_string(),
            session_id: None,
            compliance_tags: vec!["backup".to_string()],
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn store(&self, event: AuditEvent) -> CybsResult<()>;
}

/// Sink that emits audit events as structured log lines.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn store(&self, event: AuditEvent) -> CybsResult<()> {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            resource = %event.resource,
            action = %event.action,
            result = %event.result,
            "audit"
        );
        Ok(())
    }
}

/// In-memory sink for tests and embedded use.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn store(&self, event: AuditEvent) -> CybsResult<()> {
        self.events.lock().expect("audit lock poisoned").push(event);
        Ok(())
    }
}
