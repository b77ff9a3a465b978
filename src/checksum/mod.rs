use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{AuditError, Result};

/// Shared cancellation signal checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ChecksumOutcome {
    Digest(String),
    Missing,
    Unreadable(String),
    Cancelled,
}

impl ChecksumOutcome {
    pub fn digest(&self) -> Option<&str> {
        match self {
            ChecksumOutcome::Digest(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Valid,
    Mismatch { expected: String, actual: String },
    Missing,
    Unreadable { reason: String },
    Cancelled,
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyOutcome::Valid => "valid",
            VerifyOutcome::Mismatch { .. } => "invalid",
            VerifyOutcome::Missing => "missing",
            VerifyOutcome::Unreadable { .. } => "unreadable",
            VerifyOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkDigest {
    pub index: u64,
    pub offset: u64,
    pub len: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ChecksumVerificationService {
    chunk_size: usize,
}

impl Default for ChecksumVerificationService {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChecksumVerificationService {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn compute_checksum(&self, path: impl AsRef<Path>) -> ChecksumOutcome {
        self.compute_checksum_cancellable(path, &CancelFlag::new())
    }

    /// Streams the file through SHA-256 one chunk at a time. A cancelled run
    /// never yields a digest for the bytes read so far.
    pub fn compute_checksum_cancellable(&self, path: impl AsRef<Path>, cancel: &CancelFlag) -> ChecksumOutcome {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return ChecksumOutcome::Missing,
            Err(e) => return ChecksumOutcome::Unreadable(e.to_string()),
        };

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("Checksum of {} cancelled after {} bytes", path.display(), total);
                return ChecksumOutcome::Cancelled;
            }
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Checksum read failed for {}: {}", path.display(), e);
                    return ChecksumOutcome::Unreadable(e.to_string());
                }
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        ChecksumOutcome::Digest(format!("{:x}", hasher.finalize()))
    }

    pub async fn compute_checksum_async(&self, path: impl Into<PathBuf>, cancel: CancelFlag) -> ChecksumOutcome {
        let path = path.into();
        let service = self.clone();
        match tokio::task::spawn_blocking(move || service.compute_checksum_cancellable(&path, &cancel)).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => ChecksumOutcome::Cancelled,
            Err(e) => ChecksumOutcome::Unreadable(e.to_string()),
        }
    }

    pub fn verify(&self, path: impl AsRef<Path>, expected: &str) -> bool {
        self.verify_detailed(path, expected).is_valid()
    }

    pub fn verify_detailed(&self, path: impl AsRef<Path>, expected: &str) -> VerifyOutcome {
        compare(self.compute_checksum(path), expected)
    }

    /// `verify_detailed` on the blocking pool; stops early once `cancel` is set.
    pub async fn verify_detailed_async(
        &self,
        path: impl Into<PathBuf>,
        expected: &str,
        cancel: CancelFlag,
    ) -> VerifyOutcome {
        compare(self.compute_checksum_async(path, cancel).await, expected)
    }

    /// Per-chunk digests, used to check the already received prefix of a
    /// resumed transfer.
    pub fn compute_chunk_digests(&self, path: impl AsRef<Path>) -> Result<Vec<ChunkDigest>> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let n = read_full(&mut file, &mut buf)?;
            if n == 0 {
                break;
            }
            chunks.push(ChunkDigest {
                index: chunks.len() as u64,
                offset,
                len: n,
                sha256: sha256_hex(&buf[..n]),
            });
            offset += n as u64;
            if n < buf.len() {
                break;
            }
        }

        Ok(chunks)
    }

    pub fn first_mismatch(expected: &[ChunkDigest], actual: &[ChunkDigest]) -> Option<u64> {
        for (i, (a, b)) in expected.iter().zip(actual.iter()).enumerate() {
            if a.len != b.len || a.sha256 != b.sha256 {
                return Some(i as u64);
            }
        }
        if expected.len() != actual.len() {
            return Some(expected.len().min(actual.len()) as u64);
        }
        None
    }
}

fn compare(outcome: ChecksumOutcome, expected: &str) -> VerifyOutcome {
    match outcome {
        ChecksumOutcome::Digest(actual) => {
            if digests_equal(&actual, expected) {
                VerifyOutcome::Valid
            } else {
                VerifyOutcome::Mismatch {
                    expected: expected.trim().to_ascii_lowercase(),
                    actual,
                }
            }
        }
        ChecksumOutcome::Missing => VerifyOutcome::Missing,
        ChecksumOutcome::Unreadable(reason) => VerifyOutcome::Unreadable { reason },
        ChecksumOutcome::Cancelled => VerifyOutcome::Cancelled,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn digests_equal(actual: &str, expected: &str) -> bool {
    let expected = expected.trim().to_ascii_lowercase();
    if actual.len() != expected.len() {
        return false;
    }
    actual
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn read_full(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AuditError::Io(e)),
        }
    }
    Ok(filled)
}
