//! Backup file formats
//!
//! V1 is pretty-printed UTF-8 JSON. V2 is a binary envelope: an 8-byte
//! magic, a big-endian u32 header length, a JSON header carrying counts
//! and a SHA-256 checksum, then a gzip-compressed JSON payload. The
//! checksum covers the compressed payload and is verified before any
//! decoding.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::BaseDirs;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{BackupError, Result};
use crate::graph::{Edge, Node};

/// Magic signature opening every V2 backup file.
pub const BACKUP_MAGIC: &[u8; 8] = b"FLOOPBK\0";

/// Hard cap on backup file size: 50 MiB.
pub const MAX_BACKUP_BYTES: u64 = 50 * 1024 * 1024;

// Header length sanity bound; a real header is well under this.
const MAX_HEADER_BYTES: u32 = 1024 * 1024;

// ============================================================================
// TYPES
// ============================================================================

/// On-disk backup format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFormat {
    /// Plain pretty-printed JSON
    V1,
    /// Gzip payload with SHA-256 checksum envelope
    V2,
}

impl BackupFormat {
    pub fn version(&self) -> u32 {
        match self {
            BackupFormat::V1 => 1,
            BackupFormat::V2 => 2,
        }
    }

    /// File extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            BackupFormat::V1 => "json",
            BackupFormat::V2 => "json.gz",
        }
    }
}

/// Full backup body, shared by both formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupBody {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// V2 envelope header, readable without touching the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupHeader {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub compressed: bool,
    /// Hex SHA-256 of the compressed payload
    pub checksum: String,
}

/// Backup file name for a timestamp: `floop-backup-YYYYMMDD-HHMMSS.json[.gz]`.
///
/// Lexicographic order of these names equals chronological order.
pub fn backup_file_name(format: BackupFormat, at: DateTime<Utc>) -> String {
    format!(
        "floop-backup-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// Default backup directory: `~/.floop/backups`.
pub fn default_backup_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or_else(|| {
        BackupError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine home directory",
        ))
    })?;
    Ok(base.home_dir().join(".floop").join("backups"))
}

// ============================================================================
// WRITE
// ============================================================================

/// Write a backup atomically: parent directory created 0700, content
/// written to a temp file with 0600 permissions, then renamed into place.
pub fn write_backup(path: &Path, format: BackupFormat, body: &BackupBody) -> Result<()> {
    let bytes = match format {
        BackupFormat::V1 => encode_v1(body)?,
        BackupFormat::V2 => encode_v2(body)?,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        }
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
    }
    fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        version = format.version(),
        bytes = bytes.len(),
        nodes = body.nodes.len(),
        edges = body.edges.len(),
        "Wrote backup"
    );
    Ok(())
}

fn encode_v1(body: &BackupBody) -> Result<Vec<u8>> {
    let body = BackupBody {
        version: 1,
        ..body.clone()
    };
    let mut bytes = serde_json::to_vec_pretty(&body)
        .map_err(|e| BackupError::Corrupted(format!("unserializable body: {}", e)))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn encode_v2(body: &BackupBody) -> Result<Vec<u8>> {
    let body = BackupBody {
        version: 2,
        ..body.clone()
    };
    let body_json = serde_json::to_vec(&body)
        .map_err(|e| BackupError::Corrupted(format!("unserializable body: {}", e)))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body_json)?;
    let payload = encoder.finish()?;

    let checksum = hex_digest(&payload);
    let header = BackupHeader {
        version: 2,
        created_at: body.created_at,
        node_count: body.nodes.len(),
        edge_count: body.edges.len(),
        compressed: true,
        checksum,
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| BackupError::Corrupted(format!("unserializable header: {}", e)))?;

    let mut out = Vec::with_capacity(12 + header_json.len() + payload.len());
    out.extend_from_slice(BACKUP_MAGIC);
    out.extend_from_slice(&(header_json.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_json);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// READ
// ============================================================================

/// Read a backup file, auto-detecting the format by its magic signature.
///
/// Rejects files over [`MAX_BACKUP_BYTES`]. For V2 the payload checksum
/// is verified before decompression; any mismatch, bad length, or
/// truncated gzip surfaces as `Corrupted` without partial results.
pub fn read_backup(path: &Path) -> Result<(BackupBody, BackupFormat)> {
    check_size(path)?;
    let bytes = fs::read(path)?;

    if bytes.starts_with(BACKUP_MAGIC) {
        let (header, payload) = split_envelope(&bytes, path)?;
        if header.version != 2 {
            return Err(BackupError::UnsupportedVersion(header.version));
        }
        let actual = hex_digest(payload);
        if actual != header.checksum {
            return Err(BackupError::Corrupted(format!(
                "checksum mismatch in {}: header {}, payload {}",
                path.display(),
                header.checksum,
                actual
            )));
        }

        let mut decoder = GzDecoder::new(payload);
        let mut body_json = Vec::new();
        decoder.read_to_end(&mut body_json).map_err(|e| {
            BackupError::Corrupted(format!("truncated gzip payload in {}: {}", path.display(), e))
        })?;
        let body: BackupBody = serde_json::from_slice(&body_json).map_err(|e| {
            BackupError::Corrupted(format!("invalid body JSON in {}: {}", path.display(), e))
        })?;
        return Ok((body, BackupFormat::V2));
    }

    // No magic: plain JSON. Peek at the version field before committing.
    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        BackupError::Corrupted(format!("invalid JSON in {}: {}", path.display(), e))
    })?;
    let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    if version != 1 {
        return Err(BackupError::UnsupportedVersion(version));
    }
    let body: BackupBody = serde_json::from_value(value).map_err(|e| {
        BackupError::Corrupted(format!("invalid body JSON in {}: {}", path.display(), e))
    })?;
    Ok((body, BackupFormat::V1))
}

/// Split a V2 envelope into its parsed header and raw payload slice.
fn split_envelope<'a>(bytes: &'a [u8], path: &Path) -> Result<(BackupHeader, &'a [u8])> {
    if bytes.len() < 12 {
        return Err(BackupError::Corrupted(format!(
            "{} is too short",
            path.display()
        )));
    }
    let header_len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let header_end = 12usize.saturating_add(header_len as usize);
    if header_len == 0 || header_len > MAX_HEADER_BYTES || header_end > bytes.len() {
        return Err(BackupError::Corrupted(format!(
            "bad header length {} in {}",
            header_len,
            path.display()
        )));
    }
    let header: BackupHeader = serde_json::from_slice(&bytes[12..header_end]).map_err(|e| {
        BackupError::Corrupted(format!("invalid header JSON in {}: {}", path.display(), e))
    })?;
    Ok((header, &bytes[header_end..]))
}

/// Read the V2 envelope header without decompressing the payload.
pub fn read_header(path: &Path) -> Result<BackupHeader> {
    check_size(path)?;
    let mut file = fs::File::open(path)?;

    let mut prefix = [0u8; 12];
    file.read_exact(&mut prefix)
        .map_err(|_| BackupError::Corrupted(format!("{} is too short", path.display())))?;
    if &prefix[..8] != BACKUP_MAGIC {
        return Err(BackupError::Corrupted(format!(
            "{} has no backup magic",
            path.display()
        )));
    }

    let header_len = u32::from_be_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]);
    if header_len == 0 || header_len > MAX_HEADER_BYTES {
        return Err(BackupError::Corrupted(format!(
            "bad header length {} in {}",
            header_len,
            path.display()
        )));
    }

    let mut header_json = vec![0u8; header_len as usize];
    file.read_exact(&mut header_json).map_err(|_| {
        BackupError::Corrupted(format!("truncated header in {}", path.display()))
    })?;
    serde_json::from_slice(&header_json).map_err(|e| {
        BackupError::Corrupted(format!("invalid header JSON in {}: {}", path.display(), e))
    })
}

/// Verify a V2 backup's checksum by streaming the payload through the
/// digest without decompressing it.
pub fn verify_checksum(path: &Path) -> Result<()> {
    check_size(path)?;
    let mut file = fs::File::open(path)?;

    let mut prefix = [0u8; 12];
    file.read_exact(&mut prefix)
        .map_err(|_| BackupError::Corrupted(format!("{} is too short", path.display())))?;
    if &prefix[..8] != BACKUP_MAGIC {
        return Err(BackupError::Corrupted(format!(
            "{} has no backup magic",
            path.display()
        )));
    }
    let header_len = u32::from_be_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]);
    if header_len == 0 || header_len > MAX_HEADER_BYTES {
        return Err(BackupError::Corrupted(format!(
            "bad header length {} in {}",
            header_len,
            path.display()
        )));
    }
    let mut header_json = vec![0u8; header_len as usize];
    file.read_exact(&mut header_json).map_err(|_| {
        BackupError::Corrupted(format!("truncated header in {}", path.display()))
    })?;
    let header: BackupHeader = serde_json::from_slice(&header_json).map_err(|e| {
        BackupError::Corrupted(format!("invalid header JSON in {}: {}", path.display(), e))
    })?;

    // Everything after the header is payload; stream it through the digest.
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    if actual != header.checksum {
        return Err(BackupError::Corrupted(format!(
            "checksum mismatch in {}: header {}, payload {}",
            path.display(),
            header.checksum,
            actual
        )));
    }
    Ok(())
}

fn check_size(path: &Path) -> Result<()> {
    let size = fs::metadata(path)?.len();
    if size > MAX_BACKUP_BYTES {
        return Err(BackupError::SizeExceeded {
            size,
            limit: MAX_BACKUP_BYTES,
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
