//! Backup module - Versioned archives, restore modes, retention
//!
//! Two on-disk formats (plain JSON and a gzip+SHA-256 envelope), merge
//! and replace restore, and retention policies over the backup
//! directory.

mod format;
mod restore;
mod retention;

use std::path::{Path, PathBuf};

use crate::storage::StoreError;

pub use format::{
    backup_file_name, default_backup_dir, read_backup, read_header, verify_checksum, write_backup,
    BackupBody, BackupFormat, BackupHeader, BACKUP_MAGIC, MAX_BACKUP_BYTES,
};
pub use restore::{restore, snapshot_store, RestoreMode, RestoreReport};
pub use retention::{
    apply_retention, list_backups, parse_duration, parse_size, BackupEntry, RetentionPolicy,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Backup subsystem error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Magic mismatch, bad header length, checksum failure, truncated gzip
    #[error("Corrupted backup: {0}")]
    Corrupted(String),
    /// Unknown `version` field
    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),
    /// Backup file over the hard size cap
    #[error("Backup exceeds size limit: {size} bytes (limit {limit})")]
    SizeExceeded { size: u64, limit: u64 },
    /// Path escapes the allowed-directories whitelist
    #[error("Path outside allowed directories: {0}")]
    PathRejected(PathBuf),
    /// Malformed retention/duration/size input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Underlying store failure during restore
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    /// Cooperative cancellation fired
    #[error("Operation cancelled")]
    Cancelled,
}

/// Backup result type
pub type Result<T> = std::result::Result<T, BackupError>;

// ============================================================================
// PATH VALIDATION
// ============================================================================

/// Validate a caller-supplied path against an allowed-directories
/// whitelist (path traversal defense).
///
/// Paths are canonicalized before the containment check; for a
/// not-yet-existing file the parent directory is canonicalized instead.
/// An empty whitelist skips validation (internal/default paths only).
pub fn validate_path(path: &Path, allowed_dirs: &[PathBuf]) -> Result<PathBuf> {
    if allowed_dirs.is_empty() {
        return Ok(path.to_path_buf());
    }

    let canonical = canonicalize_lenient(path)
        .map_err(|_| BackupError::PathRejected(path.to_path_buf()))?;

    for dir in allowed_dirs {
        if let Ok(dir_canonical) = dir.canonicalize() {
            if canonical.starts_with(&dir_canonical) {
                return Ok(canonical);
            }
        }
    }
    Err(BackupError::PathRejected(path.to_path_buf()))
}

/// Canonicalize a path that may not exist yet: resolve the parent and
/// re-attach the file name.
fn canonicalize_lenient(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return path.canonicalize();
    }
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    Ok(parent.canonicalize()?.join(name))
}
