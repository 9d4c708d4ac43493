//! Backup orchestrator: job table, transfer pipeline, retention cleanup.
//!
//! Each backup runs as one independently cancellable Tokio task; jobs
//! for different configurations may run concurrently, while a second
//! start for the same configuration is rejected until the active run
//! reaches a terminal state. Cancellation is cooperative and checked
//! only between object operations, never mid-transfer of a single
//! object.
//!
//! Failure policy: a single object's failure never aborts the job (it is
//! counted and audited); errors during listing, manifest construction,
//! or persistence abort the whole job.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use cybs3_core::{AuditEvent, AuditSink, BackupConfiguration, CybsError, CybsResult};
use cybs3_crypto::{
    chunk_size_for, derive_key, encrypt_bytes, DerivedKey, Mnemonic,
};
use cybs3_storage::{StorageClient, StorageClientFactory};

use crate::job::{BackupJob, JobStatus};
use crate::manifest::{BackupManifest, BackupObject, BackupStatistics, SourceDescriptor};

struct JobEntry {
    job: BackupJob,
    cancel: CancellationToken,
}

struct Inner {
    factory: Arc<dyn StorageClientFactory>,
    audit: Arc<dyn AuditSink>,
    /// Key source for backup-level encryption; required only when a
    /// configuration enables encryption.
    mnemonic: Option<Mnemonic>,
    configurations: Mutex<HashMap<Uuid, BackupConfiguration>>,
    jobs: Mutex<HashMap<Uuid, JobEntry>>,
    manifests: Mutex<HashMap<Uuid, BackupManifest>>,
}

pub struct BackupOrchestrator {
    inner: Arc<Inner>,
}

enum JobOutcome {
    Completed(Box<BackupManifest>),
    Cancelled,
}

impl BackupOrchestrator {
    pub fn new(
        factory: Arc<dyn StorageClientFactory>,
        audit: Arc<dyn AuditSink>,
        mnemonic: Option<Mnemonic>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                audit,
                mnemonic,
                configurations: Mutex::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
                manifests: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub async fn register_configuration(&self, config: BackupConfiguration) {
        self.inner.configurations.lock().await.insert(config.id, config);
    }

    /// Start a backup for `configuration_id`, returning the new job id
    /// immediately; the transfer runs in the background.
    pub async fn start_backup(&self, configuration_id: Uuid) -> CybsResult<Uuid> {
        let config = self
            .inner
            .configurations
            .lock()
            .await
            .get(&configuration_id)
            .cloned()
            .ok_or_else(|| {
                CybsError::JobState(format!("configuration not found: {configuration_id}"))
            })?;

        let job = BackupJob::new(configuration_id);
        let job_id = job.id;
        let cancel = CancellationToken::new();

        {
            let mut jobs = self.inner.jobs.lock().await;
            // Serialize runs per configuration: overlapping backups of
            // one source would race on the destination layout.
            let active = jobs.values().any(|e| {
                e.job.configuration_id == configuration_id && !e.job.status.is_terminal()
            });
            if active {
                return Err(CybsError::JobState(format!(
                    "a backup for configuration {configuration_id} is already running"
                )));
            }
            jobs.insert(
                job_id,
                JobEntry {
                    job,
                    cancel: cancel.clone(),
                },
            );
        }

        self.inner
            .audit_event(
                AuditEvent::new("backup.job", &format!("job/{job_id}"), "create", "success")
                    .with_metadata("configuration_id", configuration_id.to_string()),
            )
            .await;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            Inner::run_job(inner, job_id, config, cancel).await;
        });

        Ok(job_id)
    }

    /// Request cooperative cancellation. The job observes the request at
    /// the next object boundary and transitions to `cancelled`.
    pub async fn cancel_backup(&self, job_id: Uuid) -> CybsResult<()> {
        let jobs = self.inner.jobs.lock().await;
        let entry = jobs
            .get(&job_id)
            .ok_or_else(|| CybsError::JobState(format!("job not found: {job_id}")))?;
        if entry.job.status.is_terminal() {
            return Err(CybsError::JobState(format!(
                "job {job_id} already {:?}",
                entry.job.status
            )));
        }
        entry.cancel.cancel();
        Ok(())
    }

    pub async fn job_status(&self, job_id: Uuid) -> CybsResult<BackupJob> {
        self.inner
            .jobs
            .lock()
            .await
            .get(&job_id)
            .map(|e| e.job.clone())
            .ok_or_else(|| CybsError::JobState(format!("job not found: {job_id}")))
    }

    pub async fn list_jobs(&self) -> Vec<BackupJob> {
        self.inner
            .jobs
            .lock()
            .await
            .values()
            .map(|e| e.job.clone())
            .collect()
    }

    pub async fn manifest(&self, job_id: Uuid) -> Option<BackupManifest> {
        self.inner.manifests.lock().await.get(&job_id).cloned()
    }

    /// Prune completed jobs that fall outside their configuration's
    /// retention windows, or past its `max_backups` cap. Every deletion
    /// is individually audited; stored backup objects are removed via
    /// the job's manifest.
    pub async fn cleanup_old_backups(&self) -> CybsResult<usize> {
        let configs: Vec<BackupConfiguration> = self
            .inner
            .configurations
            .lock()
            .await
            .values()
            .filter(|c| c.enabled)
            .cloned()
            .collect();

        let now = Utc::now();
        let mut deleted = 0usize;

        for config in configs {
            let mut completed: Vec<(Uuid, DateTime<Utc>)> = {
                let jobs = self.inner.jobs.lock().await;
                jobs.values()
                    .filter(|e| {
                        e.job.configuration_id == config.id
                            && e.job.status == JobStatus::Completed
                    })
                    .filter_map(|e| e.job.completed_at.map(|t| (e.job.id, t)))
                    .collect()
            };
            completed.sort_by(|a, b| b.1.cmp(&a.1));

            for (rank, (job_id, completed_at)) in completed.iter().enumerate() {
                let reason = if !config.retention.should_retain(*completed_at, now) {
                    Some("retention-expired")
                } else if config.max_backups > 0 && rank as u32 >= config.max_backups {
                    Some("max-backups-cap")
                } else {
                    None
                };

                if let Some(reason) = reason {
                    self.delete_backup(&config, *job_id, reason).await?;
                    deleted += 1;
                }
            }
        }

        Ok(deleted)
    }

    async fn delete_backup(
        &self,
        config: &BackupConfiguration,
        job_id: Uuid,
        reason: &str,
    ) -> CybsResult<()> {
        let manifest = self.inner.manifests.lock().await.remove(&job_id);

        // Best-effort removal of the stored objects; the job record goes
        // regardless so retention cannot wedge on a flaky backend.
        if let Some(manifest) = &manifest {
            if let Ok(dest) = self.inner.factory.client(&config.destination) {
                for object in &manifest.objects {
                    if let Some(backup_key) = object.metadata.get("backup-key") {
                        if let Err(e) = dest.delete(backup_key).await {
                            warn!(job_id = %job_id, key = %backup_key, "deleting backup object: {e}");
                        }
                    }
                }
                let manifest_key = manifest_key(config, job_id);
                if let Err(e) = dest.delete(&manifest_key).await {
                    warn!(job_id = %job_id, key = %manifest_key, "deleting manifest: {e}");
                }
            }
        }

        self.inner.jobs.lock().await.remove(&job_id);

        self.inner
            .audit
            .store(
                AuditEvent::new("backup.retention", &format!("job/{job_id}"), "delete", "success")
                    .with_metadata("configuration_id", config.id.to_string())
                    .with_metadata("reason", reason),
            )
            .await?;

        info!(job_id = %job_id, reason, "pruned backup");
        Ok(())
    }
}

impl Inner {
    /// Fire an audit event from inside a job task. Sink failures are
    /// logged rather than propagated so a flaky sink cannot change the
    /// course of a running job.
    async fn audit_event(&self, event: AuditEvent) {
        if let Err(e) = self.audit.store(event).await {
            warn!("audit sink failure: {e}");
        }
    }

    async fn update_job(&self, job_id: Uuid, f: impl FnOnce(&mut BackupJob)) {
        if let Some(entry) = self.jobs.lock().await.get_mut(&job_id) {
            f(&mut entry.job);
        }
    }

    async fn run_job(
        inner: Arc<Inner>,
        job_id: Uuid,
        config: BackupConfiguration,
        cancel: CancellationToken,
    ) {
        inner
            .update_job(job_id, |job| {
                job.status = JobStatus::Running;
                job.started_at = Some(Utc::now());
            })
            .await;
        inner
            .audit_event(AuditEvent::new(
                "backup.job",
                &format!("job/{job_id}"),
                "start",
                "success",
            ))
            .await;

        match inner.run_transfer(job_id, &config, &cancel).await {
            Ok(JobOutcome::Completed(manifest)) => {
                let failed = manifest.statistics.failed_objects;
                inner.manifests.lock().await.insert(job_id, *manifest);
                inner
                    .update_job(job_id, |job| {
                        job.status = JobStatus::Completed;
                        job.completed_at = Some(Utc::now());
                        job.progress.current_operation = "completed".into();
                    })
                    .await;
                inner
                    .audit_event(
                        AuditEvent::new("backup.job", &format!("job/{job_id}"), "complete", "success")
                            .with_metadata("failed_objects", failed.to_string()),
                    )
                    .await;
                info!(job_id = %job_id, failed_objects = failed, "backup completed");
            }
            Ok(JobOutcome::Cancelled) => {
                inner
                    .update_job(job_id, |job| {
                        job.status = JobStatus::Cancelled;
                        job.completed_at = Some(Utc::now());
                        job.progress.current_operation = "cancelled".into();
                    })
                    .await;
                inner
                    .audit_event(AuditEvent::new(
                        "backup.job",
                        &format!("job/{job_id}"),
                        "cancel",
                        "success",
                    ))
                    .await;
                info!(job_id = %job_id, "backup cancelled");
            }
            Err(e) => {
                let message = e.to_string();
                inner
                    .update_job(job_id, |job| {
                        job.status = JobStatus::Failed;
                        job.completed_at = Some(Utc::now());
                        job.error = Some(message.clone());
                    })
                    .await;
                inner
                    .audit_event(
                        AuditEvent::new("backup.job", &format!("job/{job_id}"), "fail", "failure")
                            .with_metadata("error", message.clone()),
                    )
                    .await;
                error!(job_id = %job_id, error = %message, "backup failed");
            }
        }
    }

    async fn run_transfer(
        &self,
        job_id: Uuid,
        config: &BackupConfiguration,
        cancel: &CancellationToken,
    ) -> CybsResult<JobOutcome> {
        let start_time = Utc::now();
        let stamp = start_time.format("%Y-%m-%d-%H-%M-%S").to_string();

        let key = self.encryption_key(config)?;

        let source = self.factory.client(&config.source)?;
        let dest = self.factory.client(&config.destination)?;

        let source_prefix = config.source.prefix.clone().unwrap_or_default();
        let listing: Vec<_> = source
            .list(&source_prefix)
            .await?
            .into_iter()
            .filter(|o| !o.key.ends_with('/'))
            .collect();

        let bytes_total: u64 = listing.iter().map(|o| o.size).sum();
        self.update_job(job_id, |job| {
            job.progress.objects_total = listing.len() as u64;
            job.progress.bytes_total = bytes_total;
            job.progress.current_operation = format!("listed {} objects", listing.len());
        })
        .await;

        let mut objects: Vec<BackupObject> = Vec::new();
        let mut failed_objects = 0u64;
        let mut bytes_processed = 0u64;
        let total = listing.len();

        for (index, remote) in listing.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(JobOutcome::Cancelled);
            }

            let backup_key = backup_object_key(config, &stamp, &remote.key);
            let result = self
                .transfer_object(&*source, &*dest, config, key.as_ref(), remote, &backup_key)
                .await;

            let operation = match result {
                Ok(object) => {
                    bytes_processed += object.size;
                    objects.push(object);
                    format!("backed up {} ({}/{})", remote.key, index + 1, total)
                }
                Err(e) => {
                    failed_objects += 1;
                    self.audit_event(
                        AuditEvent::new(
                            "backup.object",
                            &format!("object/{}", remote.key),
                            "transfer",
                            "failure",
                        )
                        .with_metadata("job_id", job_id.to_string())
                        .with_metadata("error", e.to_string()),
                    )
                    .await;
                    warn!(job_id = %job_id, key = %remote.key, "object transfer failed: {e}");
                    format!("failed {} ({}/{})", remote.key, index + 1, total)
                }
            };

            self.update_job(job_id, |job| {
                job.progress.objects_processed = (index + 1) as u64;
                job.progress.bytes_processed = bytes_processed;
                job.progress.current_operation = operation;
            })
            .await;
        }

        let end_time = Utc::now();
        let duration_secs = (end_time - start_time).num_milliseconds() as f64 / 1000.0;
        let total_size: u64 = objects.iter().map(|o| o.size).sum();
        let throughput = if duration_secs > 0.0 {
            total_size as f64 / duration_secs
        } else {
            total_size as f64
        };

        let manifest = BackupManifest {
            id: Uuid::new_v4(),
            job_id,
            created_at: end_time,
            source: SourceDescriptor {
                provider: config.source.provider.provider.clone(),
                bucket: config.source.bucket.clone(),
                prefix: config.source.prefix.clone(),
                region: config.source.provider.region.clone(),
            },
            objects,
            statistics: BackupStatistics {
                total_objects: (total as u64) - failed_objects,
                total_size,
                failed_objects,
                start_time,
                end_time,
                throughput_bytes_per_sec: throughput,
            },
        };

        dest.upload(&manifest_key(config, job_id), manifest.to_bytes()?)
            .await?;

        Ok(JobOutcome::Completed(Box::new(manifest)))
    }

    /// Move one object through the pipeline:
    /// download → compress (pass-through) → encrypt → upload.
    async fn transfer_object(
        &self,
        source: &dyn StorageClient,
        dest: &dyn StorageClient,
        config: &BackupConfiguration,
        key: Option<&DerivedKey>,
        remote: &cybs3_storage::RemoteObject,
        backup_key: &str,
    ) -> CybsResult<BackupObject> {
        let data = source.download(&remote.key).await?;

        // Compression codecs are pluggable and none is configured, so the
        // compress step is a pass-through; the flag is still recorded so a
        // restore path knows what it is reading.
        let mut metadata = HashMap::from([
            ("backup-key".to_string(), backup_key.to_string()),
            (
                "compressed".to_string(),
                config.compression_enabled.to_string(),
            ),
            (
                "encrypted".to_string(),
                config.encryption_enabled.to_string(),
            ),
        ]);

        let payload = match key {
            Some(key) => {
                let chunk_size = chunk_size_for(data.len() as u64);
                metadata.insert("chunk-size".to_string(), chunk_size.to_string());
                encrypt_bytes(key, &data, chunk_size)?
            }
            None => data,
        };

        dest.upload(backup_key, payload).await?;

        Ok(BackupObject {
            key: remote.key.clone(),
            size: remote.size,
            last_modified: remote.last_modified,
            etag: remote.etag.clone(),
            metadata,
        })
    }

    /// Derive the backup encryption key, if this configuration wants one.
    /// Enabled encryption without a configured mnemonic is a fatal
    /// configuration error; plaintext is never silently uploaded.
    fn encryption_key(&self, config: &BackupConfiguration) -> CybsResult<Option<DerivedKey>> {
        if !config.encryption_enabled {
            return Ok(None);
        }
        let mnemonic = self.mnemonic.as_ref().ok_or_else(|| {
            CybsError::Configuration(
                "encryption is enabled but no mnemonic is configured".into(),
            )
        })?;
        Ok(Some(derive_key(mnemonic)?))
    }
}

fn backup_object_key(config: &BackupConfiguration, stamp: &str, original_key: &str) -> String {
    match config.key_prefix.as_deref() {
        Some(prefix) => format!("{prefix}/{stamp}/{original_key}"),
        None => format!("{stamp}/{original_key}"),
    }
}

fn manifest_key(config: &BackupConfiguration, job_id: Uuid) -> String {
    match config.key_prefix.as_deref() {
        Some(prefix) => format!("{prefix}/manifests/{job_id}.json"),
        None => format!("manifests/{job_id}.json"),
    }
}
