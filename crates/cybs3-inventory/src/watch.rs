//! Polling file watcher.
//!
//! A single cooperative task re-scans the tree once per tick and diffs
//! against its last-known map of relative path → modification time. No
//! two scan passes ever overlap, and the watcher's state is owned
//! exclusively by its task; there is nothing to lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cybs3_core::CybsResult;

use crate::scan::scan_folder;

/// One detected change, carrying the path relative to the watch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(String),
    Modified(String),
    Deleted(String),
}

pub type WatchHandler = Box<dyn Fn(WatchEvent) + Send>;

pub struct FileWatcher {
    root: PathBuf,
    exclude_patterns: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_patterns: Vec::new(),
            interval: Duration::from_secs(1),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Start polling. The initial scan seeds the known-file map without
    /// emitting events; subsequent ticks emit one event per change.
    pub fn start(&mut self, handler: WatchHandler) -> CybsResult<()> {
        let mut known = snapshot(&self.root, &self.exclude_patterns)?;

        let root = self.root.clone();
        let excludes = self.exclude_patterns.clone();
        let cancel = self.cancel.clone();
        let interval = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let current = match snapshot(&root, &excludes) {
                    Ok(map) => map,
                    Err(e) => {
                        tracing::warn!(root = %root.display(), "watch scan failed: {e}");
                        continue;
                    }
                };

                for (rel, mtime) in &current {
                    match known.get(rel) {
                        None => handler(WatchEvent::Created(rel.clone())),
                        Some(prev) if prev != mtime => {
                            handler(WatchEvent::Modified(rel.clone()))
                        }
                        Some(_) => {}
                    }
                }
                for rel in known.keys() {
                    if !current.contains_key(rel) {
                        handler(WatchEvent::Deleted(rel.clone()));
                    }
                }

                known = current;
            }
        }));
        Ok(())
    }

    /// Cooperative stop: the loop ends at the next tick boundary.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn snapshot(
    root: &std::path::Path,
    excludes: &[String],
) -> CybsResult<HashMap<String, DateTime<Utc>>> {
    let records = scan_folder(root, excludes)?;
    Ok(records
        .into_iter()
        .map(|r| (r.relative_path, r.modified))
        .collect())
}
