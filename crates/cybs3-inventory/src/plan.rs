//! Sync planning: partition local files against a remote inventory.
//!
//! Every local file lands in exactly one of `to_upload` / `in_sync`;
//! remote entries never matched by a local file (and not directory
//! markers) land in `remote_only`. The three partitions are disjoint.

use std::collections::HashMap;

use cybs3_core::CybsResult;
use cybs3_crypto::{chunk_size_for, encrypted_size, FRAME_OVERHEAD};
use cybs3_storage::RemoteObject;

use crate::scan::{compute_file_hash, LocalFileRecord};

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub to_upload: Vec<LocalFileRecord>,
    pub in_sync: Vec<LocalFileRecord>,
    pub remote_only: Vec<RemoteObject>,
    /// Sum of `to_upload` sizes
    pub total_bytes_to_upload: u64,
}

/// Compare local files against a remote listing.
///
/// Remote keys are normalized by stripping `prefix` (and a following
/// `/`). A local file is `in_sync` when a remote entry exists at its
/// relative path, the remote size is within the ±28-byte encryption
/// overhead tolerance of the expected encrypted size, and the local
/// modification time is not strictly newer than the remote's.
///
/// With `use_hash_comparison`, an entry that carries a remote etag must
/// also match the local SHA-256 (computed lazily); the partition
/// contract is unchanged.
pub fn create_sync_plan(
    local: &[LocalFileRecord],
    remote: &[RemoteObject],
    prefix: &str,
    use_hash_comparison: bool,
) -> CybsResult<SyncPlan> {
    let mut remote_by_key: HashMap<String, &RemoteObject> = HashMap::with_capacity(remote.len());
    for obj in remote {
        remote_by_key.insert(normalize_key(&obj.key, prefix), obj);
    }

    let mut plan = SyncPlan::default();
    let mut matched: std::collections::HashSet<String> = std::collections::HashSet::new();

    for file in local {
        let candidate = remote_by_key.get(file.relative_path.as_str()).copied();

        let synced = match candidate {
            Some(obj) => {
                matched.insert(file.relative_path.clone());
                is_in_sync(file, obj, use_hash_comparison)?
            }
            None => false,
        };

        if synced {
            plan.in_sync.push(file.clone());
        } else {
            plan.total_bytes_to_upload += file.size;
            plan.to_upload.push(file.clone());
        }
    }

    for obj in remote {
        let normalized = normalize_key(&obj.key, prefix);
        if !matched.contains(&normalized) && !obj.key.ends_with('/') {
            plan.remote_only.push(obj.clone());
        }
    }

    tracing::debug!(
        to_upload = plan.to_upload.len(),
        in_sync = plan.in_sync.len(),
        remote_only = plan.remote_only.len(),
        bytes = plan.total_bytes_to_upload,
        "sync plan"
    );
    Ok(plan)
}

fn normalize_key(key: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return key.to_string();
    }
    match key.strip_prefix(prefix) {
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest).to_string(),
        None => key.to_string(),
    }
}

fn is_in_sync(
    file: &LocalFileRecord,
    remote: &RemoteObject,
    use_hash_comparison: bool,
) -> CybsResult<bool> {
    let expected = encrypted_size(file.size, chunk_size_for(file.size) as u64);
    let size_delta = (remote.size as i64 - expected as i64).abs();
    if size_delta > FRAME_OVERHEAD as i64 {
        return Ok(false);
    }

    if let Some(remote_mtime) = remote.last_modified {
        if file.modified > remote_mtime {
            return Ok(false);
        }
    }

    if use_hash_comparison {
        if let Some(etag) = &remote.etag {
            let local_hash = match &file.content_hash {
                Some(h) => h.clone(),
                None => compute_file_hash(&file.path)?,
            };
            return Ok(&local_hash == etag);
        }
    }

    Ok(true)
}
