//! Retention - pruning the backup directory
//!
//! Backups list newest-first by filename (the timestamped naming makes
//! lexicographic order chronological). Policies compute a keep-set over
//! that list; everything else is deleted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BackupError, Result};

const BACKUP_PREFIX: &str = "floop-backup-";

// ============================================================================
// LISTING
// ============================================================================

/// One backup file on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub version: u8,
}

/// List backup files in a directory, newest first.
///
/// Only files matching `floop-backup-*.json[.gz]` are considered.
/// Ordering is strictly by filename; `created_at` comes from the
/// filename timestamp, with file mtime as a fallback for names whose
/// timestamp segment does not parse.
pub fn list_backups(dir: &Path) -> Result<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    if !dir.exists() {
        return Ok(entries);
    }

    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let version = if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json.gz") {
            2
        } else if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
            1
        } else {
            continue;
        };

        let metadata = dir_entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let created_at = timestamp_from_name(name)
            .or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
            .unwrap_or_else(Utc::now);

        entries.push(BackupEntry {
            path: dir_entry.path(),
            size: metadata.len(),
            created_at,
            version,
        });
    }

    entries.sort_by(|a, b| b.path.file_name().cmp(&a.path.file_name()));
    Ok(entries)
}

/// Parse `YYYYMMDD-HHMMSS` out of a backup filename.
fn timestamp_from_name(name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix(BACKUP_PREFIX)?;
    let stamp = rest.strip_suffix(".json.gz").or_else(|| rest.strip_suffix(".json"))?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// POLICIES
// ============================================================================

/// A retention policy over the newest-first backup list
#[derive(Debug, Clone)]
pub enum RetentionPolicy {
    /// Keep the newest N backups
    Count(usize),
    /// Keep backups created within the window
    Age(Duration),
    /// Keep newest-first while total size stays under the limit; the
    /// newest backup is kept even when it alone exceeds it
    Size(u64),
    /// Keep a backup iff ANY sub-policy keeps it (union)
    Any(Vec<RetentionPolicy>),
}

impl RetentionPolicy {
    /// Compute the keep-set over a newest-first entry list. The returned
    /// mask is parallel to `entries`, so output order always matches the
    /// input order.
    pub fn keep(&self, entries: &[BackupEntry], now: DateTime<Utc>) -> Vec<bool> {
        match self {
            RetentionPolicy::Count(n) => {
                entries.iter().enumerate().map(|(i, _)| i < *n).collect()
            }
            RetentionPolicy::Age(max_age) => {
                let cutoff = now - *max_age;
                entries.iter().map(|e| e.created_at >= cutoff).collect()
            }
            RetentionPolicy::Size(limit) => {
                let mut total = 0u64;
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        if i == 0 {
                            total = e.size;
                            true
                        } else if total + e.size <= *limit {
                            total += e.size;
                            true
                        } else {
                            false
                        }
                    })
                    .collect()
            }
            RetentionPolicy::Any(policies) => {
                let mut mask = vec![false; entries.len()];
                for policy in policies {
                    for (slot, kept) in mask.iter_mut().zip(policy.keep(entries, now)) {
                        *slot = *slot || kept;
                    }
                }
                mask
            }
        }
    }
}

/// List the directory, apply the policy, delete the complement, and
/// return the deleted paths.
pub fn apply_retention(dir: &Path, policy: &RetentionPolicy) -> Result<Vec<PathBuf>> {
    let entries = list_backups(dir)?;
    let keep = policy.keep(&entries, Utc::now());

    let mut deleted = Vec::new();
    for (entry, kept) in entries.iter().zip(keep) {
        if kept {
            continue;
        }
        std::fs::remove_file(&entry.path)?;
        tracing::info!(path = %entry.path.display(), "Deleted expired backup");
        deleted.push(entry.path.clone());
    }
    Ok(deleted)
}

// ============================================================================
// PARSERS
// ============================================================================

/// Parse a duration like `30s`, `15m`, `12h`, `7d`, or `2w`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let number = input
        .strip_suffix(['s', 'm', 'h', 'd', 'w'])
        .ok_or_else(|| {
            BackupError::InvalidInput(format!("invalid duration unit in '{}'", input))
        })?;
    let n: i64 = number
        .parse()
        .map_err(|_| BackupError::InvalidInput(format!("invalid duration '{}'", input)))?;
    if n < 0 {
        return Err(BackupError::InvalidInput(format!(
            "negative duration '{}'",
            input
        )));
    }
    match input.chars().last() {
        Some('s') => Ok(Duration::seconds(n)),
        Some('m') => Ok(Duration::minutes(n)),
        Some('h') => Ok(Duration::hours(n)),
        Some('d') => Ok(Duration::hours(n * 24)),
        _ => Ok(Duration::hours(n * 24 * 7)),
    }
}

/// Parse a size like `512B`, `100KB`, `25MB`, or `2GB` (powers of 1024).
///
/// Suffixes match longest-first so `MB` never parses as `B`.
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    // Longest suffix first
    const SUFFIXES: [(&str, u64); 4] = [
        ("GB", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
        ("B", 1),
    ];
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = input.strip_suffix(suffix) {
            let n: u64 = number.trim().parse().map_err(|_| {
                BackupError::InvalidInput(format!("invalid size '{}'", input))
            })?;
            return n.checked_mul(multiplier).ok_or_else(|| {
                BackupError::InvalidInput(format!("size '{}' overflows", input))
            });
        }
    }
    Err(BackupError::InvalidInput(format!(
        "invalid size suffix in '{}'",
        input
    )))
}

// ============================================================================
// TESTS
// ============================================================================
