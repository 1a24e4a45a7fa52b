//! Decides whether a replica file is stale relative to its source file.
//!
//! The test is ordered from cheap to expensive:
//! 1. replica missing
//! 2. fingerprint (length, modification time) mismatch
//! 3. content hash mismatch
//!
//! Identical bytes with a differing fingerprint still count as stale. The
//! hash is recomputed on every call, so unchanged files cost a full read of
//! both copies per pass.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use futures::StreamExt;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use mirrorsync_common::Result;
use mirrorsync_storage::StorageAccess;

/// BLAKE2b-256 digest of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Get the digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

/// Outcome of comparing a source file with its replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Staleness {
    /// Replica file does not exist.
    Missing,
    /// Length or modification time differ.
    Modified,
    /// Fingerprints match but the content differs.
    HashChanged,
    /// Replica is a faithful copy.
    UpToDate,
}

impl Staleness {
    /// Whether the replica can be left alone.
    pub fn is_up_to_date(self) -> bool {
        self == Staleness::UpToDate
    }

    /// Label used in activity messages.
    pub fn label(self) -> &'static str {
        match self {
            Staleness::Missing => "NEW FILE",
            Staleness::Modified => "MODIFIED",
            Staleness::HashChanged => "HASH CHANGED",
            Staleness::UpToDate => "UP TO DATE",
        }
    }
}

/// Compares files through a storage accessor.
pub struct ChangeDetector<S: StorageAccess + ?Sized> {
    storage: Arc<S>,
}

impl<S: StorageAccess + ?Sized> ChangeDetector<S> {
    /// Create a detector reading through `storage`.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Check whether `replica` is an up-to-date copy of `source`.
    pub async fn is_up_to_date(&self, source: &Path, replica: &Path) -> Result<bool> {
        Ok(self.assess(source, replica).await?.is_up_to_date())
    }

    /// Classify `replica` relative to `source`.
    ///
    /// # Errors
    /// - Either file cannot be inspected or read
    pub async fn assess(&self, source: &Path, replica: &Path) -> Result<Staleness> {
        if !self.storage.file_exists(replica).await? {
            return Ok(Staleness::Missing);
        }

        let source_info = self.storage.file_info(source).await?;
        let replica_info = self.storage.file_info(replica).await?;
        if source_info != replica_info {
            debug!(
                "Fingerprint mismatch for {}: {:?} vs {:?}",
                replica.display(),
                source_info,
                replica_info
            );
            return Ok(Staleness::Modified);
        }

        let source_hash = self.content_hash(source).await?;
        let replica_hash = self.content_hash(replica).await?;
        if source_hash != replica_hash {
            debug!(
                "Content hash mismatch for {}: {} vs {}",
                replica.display(),
                source_hash,
                replica_hash
            );
            return Ok(Staleness::HashChanged);
        }

        Ok(Staleness::UpToDate)
    }

    /// Hash the full content of a file.
    ///
    /// The read stream is dropped before this returns, whether or not
    /// reading succeeded.
    pub async fn content_hash(&self, path: &Path) -> Result<ContentHash> {
        let mut stream = self.storage.open_read(path).await?;
        let mut hasher = Blake2b::<U32>::new();

        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk?);
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Ok(ContentHash(digest))
    }
}
