//! Recursive folder scanning and streaming content hashing.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

use cybs3_core::CybsResult;

/// Read size for streaming hashes
const HASH_BUF_SIZE: usize = 1024 * 1024;

/// One regular file found under a scan root.
#[derive(Debug, Clone)]
pub struct LocalFileRecord {
    pub path: PathBuf,
    /// Path relative to the scan root, with forward slashes
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Computed lazily, only when hash comparison is requested
    pub content_hash: Option<String>,
}

/// Recursively scan `root`, yielding a record for every regular file
/// whose root-relative path does not contain any exclude pattern as a
/// substring. Matching against the relative path keeps excludes
/// independent of where the tree happens to live on disk. Results are
/// sorted by relative path for deterministic plans.
pub fn scan_folder(root: &Path, exclude_patterns: &[String]) -> CybsResult<Vec<LocalFileRecord>> {
    let mut records = Vec::new();
    scan_inner(root, root, exclude_patterns, &mut records)?;
    records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::debug!(root = %root.display(), files = records.len(), "scanned folder");
    Ok(records)
}

fn scan_inner(
    root: &Path,
    dir: &Path,
    exclude_patterns: &[String],
    out: &mut Vec<LocalFileRecord>,
) -> CybsResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude_patterns
            .iter()
            .any(|p| relative_path.contains(p.as_str()))
        {
            continue;
        }

        let meta = entry.metadata()?;
        if meta.is_dir() {
            scan_inner(root, &path, exclude_patterns, out)?;
        } else if meta.is_file() {
            let modified: DateTime<Utc> = meta.modified()?.into();

            out.push(LocalFileRecord {
                path,
                relative_path,
                size: meta.len(),
                modified,
                content_hash: None,
            });
        }
    }
    Ok(())
}

/// Streaming SHA-256 over 1 MiB reads, returned as lowercase hex.
pub fn compute_file_hash(path: &Path) -> CybsResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_sorted_by_relative_path() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.txt", b"b");
        write(tmp.path(), "a/nested.txt", b"nested");
        write(tmp.path(), "a.txt", b"a");

        let records = scan_folder(tmp.path(), &[]).unwrap();
        let rels: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["a.txt", "a/nested.txt", "b.txt"]);
    }

    #[test]
    fn test_scan_records_size_and_mtime() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "data.bin", &[0u8; 1234]);

        let records = scan_folder(tmp.path(), &[]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 1234);
        assert!(records[0].content_hash.is_none());
        assert!(records[0].modified <= Utc::now());
    }

    #[test]
    fn test_exclude_is_substring_match() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.txt", b"keep");
        write(tmp.path(), "cache/drop.txt", b"drop");
        write(tmp.path(), "file.tmp", b"drop");

        let records =
            scan_folder(tmp.path(), &["cache".to_string(), ".tmp".to_string()]).unwrap();
        let rels: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["keep.txt"]);
    }

    #[test]
    fn test_exclude_never_matches_scan_root_path() {
        // Temp dirs are named ".tmpXXXXXX"; a ".tmp" exclude must drop
        // files named *.tmp without emptying the whole listing because
        // the root's own path contains the pattern.
        let tmp = TempDir::new().unwrap();
        assert!(tmp.path().to_string_lossy().contains(".tmp"));
        write(tmp.path(), "keep.txt", b"keep");
        write(tmp.path(), "drop.tmp", b"drop");

        let records = scan_folder(tmp.path(), &[".tmp".to_string()]).unwrap();
        let rels: Vec<&str> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["keep.txt"]);
    }

    #[test]
    fn test_compute_file_hash_known_vector() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "abc.txt", b"abc");

        let hash = compute_file_hash(&tmp.path().join("abc.txt")).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_compute_file_hash_spans_buffer_boundary() {
        let tmp = TempDir::new().unwrap();
        let data = vec![0x61u8; HASH_BUF_SIZE + 17];
        write(tmp.path(), "big.bin", &data);

        let hash = compute_file_hash(&tmp.path().join("big.bin")).unwrap();
        assert_eq!(hash, hex::encode(Sha256::digest(&data)));
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let result = scan_folder(Path::new("/nonexistent/cybs3-test"), &[]);
        assert!(matches!(result, Err(cybs3_core::CybsError::Io(_))));
    }
}
