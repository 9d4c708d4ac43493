//! Orchestrator integration tests: partial failure, cancellation,
//! overlap guarding, and retention cleanup against in-memory storage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cybs3_backup::{BackupOrchestrator, JobStatus};
use cybs3_core::{
    BackupConfiguration, CybsError, CybsResult, MemoryAuditSink, ProviderDescriptor, StorageTarget,
};
use cybs3_storage::{
    MemoryStorageClient, ObjectMetadata, RemoteObject, StorageClient, StorageClientFactory,
};

struct TestFactory {
    clients: HashMap<String, Arc<dyn StorageClient>>,
}

impl TestFactory {
    fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    fn with_bucket(mut self, bucket: &str, client: Arc<dyn StorageClient>) -> Self {
        self.clients.insert(bucket.to_string(), client);
        self
    }
}

impl StorageClientFactory for TestFactory {
    fn client(&self, target: &StorageTarget) -> CybsResult<Arc<dyn StorageClient>> {
        self.clients
            .get(&target.bucket)
            .cloned()
            .ok_or_else(|| CybsError::Storage(format!("unknown bucket: {}", target.bucket)))
    }
}

/// Delegating client that slows downloads so tests can observe a job
/// mid-flight.
struct SlowClient {
    inner: Arc<MemoryStorageClient>,
    delay: Duration,
}

#[async_trait]
impl StorageClient for SlowClient {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> CybsResult<()> {
        self.inner.upload(key, bytes).await
    }
    async fn download(&self, key: &str) -> CybsResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        self.inner.download(key).await
    }
    async fn list(&self, prefix: &str) -> CybsResult<Vec<RemoteObject>> {
        self.inner.list(prefix).await
    }
    async fn delete(&self, key: &str) -> CybsResult<()> {
        self.inner.delete(key).await
    }
    async fn exists(&self, key: &str) -> CybsResult<bool> {
        self.inner.exists(key).await
    }
    async fn metadata(&self, key: &str) -> CybsResult<ObjectMetadata> {
        self.inner.metadata(key).await
    }
}

struct FailingListClient;

#[async_trait]
impl StorageClient for FailingListClient {
    async fn upload(&self, _key: &str, _bytes: Vec<u8>) -> CybsResult<()> {
        Ok(())
    }
    async fn download(&self, key: &str) -> CybsResult<Vec<u8>> {
        Err(CybsError::Storage(format!("not found: {key}")))
    }
    async fn list(&self, _prefix: &str) -> CybsResult<Vec<RemoteObject>> {
        Err(CybsError::Storage("listing endpoint unavailable".into()))
    }
    async fn delete(&self, _key: &str) -> CybsResult<()> {
        Ok(())
    }
    async fn exists(&self, _key: &str) -> CybsResult<bool> {
        Ok(false)
    }
    async fn metadata(&self, key: &str) -> CybsResult<ObjectMetadata> {
        Err(CybsError::Storage(format!("not found: {key}")))
    }
}

fn test_config(max_backups: u32) -> BackupConfiguration {
    BackupConfiguration {
        name: "test".into(),
        source: StorageTarget {
            provider: ProviderDescriptor::default(),
            bucket: "source".into(),
            prefix: None,
        },
        destination: StorageTarget {
            provider: ProviderDescriptor::default(),
            bucket: "dest".into(),
            prefix: None,
        },
        key_prefix: Some("vault".into()),
        max_backups,
        ..Default::default()
    }
}

async fn wait_for_terminal(orchestrator: &BackupOrchestrator, job_id: Uuid) -> JobStatus {
    for _ in 0..500 {
        let job = orchestrator.job_status(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn hundred_objects_with_five_failures_still_completes() {
    let source = Arc::new(MemoryStorageClient::new());
    for i in 0..100 {
        source.put(&format!("data/obj-{i:03}"), vec![i as u8; 64]);
    }
    for i in 0..5 {
        source.fail_download(&format!("data/obj-{:03}", i * 20));
    }
    let dest = Arc::new(MemoryStorageClient::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let factory = TestFactory::new()
        .with_bucket("source", source)
        .with_bucket("dest", dest.clone());
    let orchestrator = BackupOrchestrator::new(Arc::new(factory), audit.clone(), None);

    let config = test_config(0);
    let config_id = config.id;
    orchestrator.register_configuration(config).await;

    let job_id = orchestrator.start_backup(config_id).await.unwrap();
    assert_eq!(wait_for_terminal(&orchestrator, job_id).await, JobStatus::Completed);

    let job = orchestrator.job_status(job_id).await.unwrap();
    assert_eq!(job.progress.objects_processed, 100);
    assert_eq!(job.progress.objects_total, 100);
    assert!(job.error.is_none());

    let manifest = orchestrator.manifest(job_id).await.unwrap();
    assert_eq!(manifest.statistics.failed_objects, 5);
    assert_eq!(manifest.statistics.total_objects, 95);
    assert_eq!(manifest.objects.len(), 95);

    // 95 backup objects + 1 persisted manifest in the destination
    assert_eq!(dest.keys().len(), 96);

    let object_failures = audit
        .events()
        .into_iter()
        .filter(|e| e.event_type == "backup.object" && e.result == "failure")
        .count();
    assert_eq!(object_failures, 5);
}

#[tokio::test]
async fn cancellation_stops_at_object_boundary() {
    let memory = Arc::new(MemoryStorageClient::new());
    for i in 0..50 {
        memory.put(&format!("obj-{i:02}"), vec![0u8; 32]);
    }
    let source = Arc::new(SlowClient {
        inner: memory,
        delay: Duration::from_millis(30),
    });
    let dest = Arc::new(MemoryStorageClient::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let factory = TestFactory::new()
        .with_bucket("source", source)
        .with_bucket("dest", dest);
    let orchestrator = BackupOrchestrator::new(Arc::new(factory), audit.clone(), None);

    let config = test_config(0);
    let config_id = config.id;
    orchestrator.register_configuration(config).await;

    let job_id = orchestrator.start_backup(config_id).await.unwrap();

    // Let a few objects through, then cancel mid-job.
    loop {
        let job = orchestrator.job_status(job_id).await.unwrap();
        if job.progress.objects_processed >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    orchestrator.cancel_backup(job_id).await.unwrap();

    assert_eq!(wait_for_terminal(&orchestrator, job_id).await, JobStatus::Cancelled);

    let job = orchestrator.job_status(job_id).await.unwrap();
    assert!(job.completed_at.is_some());
    assert!(job.progress.objects_processed < 50);

    // No further progress after cancellation is observed.
    let frozen = job.progress.objects_processed;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let job = orchestrator.job_status(job_id).await.unwrap();
    assert_eq!(job.progress.objects_processed, frozen);

    assert!(audit
        .events()
        .iter()
        .any(|e| e.event_type == "backup.job" && e.action == "cancel"));
}

#[tokio::test]
async fn unknown_configuration_is_rejected() {
    let factory = TestFactory::new();
    let orchestrator =
        BackupOrchestrator::new(Arc::new(factory), Arc::new(MemoryAuditSink::new()), None);

    let result = orchestrator.start_backup(Uuid::new_v4()).await;
    assert!(matches!(result, Err(CybsError::JobState(_))));
}

#[tokio::test]
async fn concurrent_starts_for_same_configuration_are_serialized() {
    let memory = Arc::new(MemoryStorageClient::new());
    for i in 0..20 {
        memory.put(&format!("obj-{i:02}"), vec![0u8; 16]);
    }
    let source = Arc::new(SlowClient {
        inner: memory,
        delay: Duration::from_millis(20),
    });
    let dest = Arc::new(MemoryStorageClient::new());

    let factory = TestFactory::new()
        .with_bucket("source", source)
        .with_bucket("dest", dest);
    let orchestrator =
        BackupOrchestrator::new(Arc::new(factory), Arc::new(MemoryAuditSink::new()), None);

    let config = test_config(0);
    let config_id = config.id;
    orchestrator.register_configuration(config).await;

    let first = orchestrator.start_backup(config_id).await.unwrap();
    let second = orchestrator.start_backup(config_id).await;
    assert!(matches!(second, Err(CybsError::JobState(_))));

    assert_eq!(wait_for_terminal(&orchestrator, first).await, JobStatus::Completed);

    // Once the first run is terminal, a new one may start.
    let third = orchestrator.start_backup(config_id).await.unwrap();
    wait_for_terminal(&orchestrator, third).await;
}

#[tokio::test]
async fn listing_failure_fails_the_job() {
    let factory = TestFactory::new()
        .with_bucket("source", Arc::new(FailingListClient))
        .with_bucket("dest", Arc::new(MemoryStorageClient::new()));
    let audit = Arc::new(MemoryAuditSink::new());
    let orchestrator = BackupOrchestrator::new(Arc::new(factory), audit.clone(), None);

    let config = test_config(0);
    let config_id = config.id;
    orchestrator.register_configuration(config).await;

    let job_id = orchestrator.start_backup(config_id).await.unwrap();
    assert_eq!(wait_for_terminal(&orchestrator, job_id).await, JobStatus::Failed);

    let job = orchestrator.job_status(job_id).await.unwrap();
    let message = job.error.expect("failed job carries an error message");
    assert!(!message.is_empty());

    assert!(audit
        .events()
        .iter()
        .any(|e| e.event_type == "backup.job" && e.action == "fail"));
}

#[tokio::test]
async fn cleanup_enforces_max_backups_cap() {
    let source = Arc::new(MemoryStorageClient::new());
    source.put("only.txt", b"payload".to_vec());
    let dest = Arc::new(MemoryStorageClient::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let factory = TestFactory::new()
        .with_bucket("source", source)
        .with_bucket("dest", dest.clone());
    let orchestrator = BackupOrchestrator::new(Arc::new(factory), audit.clone(), None);

    let config = test_config(2);
    let config_id = config.id;
    orchestrator.register_configuration(config).await;

    let mut job_ids = Vec::new();
    for _ in 0..3 {
        let job_id = orchestrator.start_backup(config_id).await.unwrap();
        assert_eq!(wait_for_terminal(&orchestrator, job_id).await, JobStatus::Completed);
        job_ids.push(job_id);
        // Distinct completion timestamps and backup-key stamps.
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    let deleted = orchestrator.cleanup_old_backups().await.unwrap();
    assert_eq!(deleted, 1);

    // The oldest job is gone, the two newest remain.
    assert!(orchestrator.job_status(job_ids[0]).await.is_err());
    assert!(orchestrator.job_status(job_ids[1]).await.is_ok());
    assert!(orchestrator.job_status(job_ids[2]).await.is_ok());

    // Its stored objects and manifest were removed from the destination.
    assert!(!dest
        .keys()
        .iter()
        .any(|k| k.contains(&job_ids[0].to_string())));

    assert!(audit
        .events()
        .iter()
        .any(|e| e.event_type == "backup.retention"
            && e.action == "delete"
            && e.metadata.get("reason").map(String::as_str) == Some("max-backups-cap")));

    // A second pass has nothing left to prune.
    assert_eq!(orchestrator.cleanup_old_backups().await.unwrap(), 0);
}
