//! Storage access trait definition.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use mirrorsync_common::Result;

/// Size and modification time of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Size in bytes.
    pub length: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Byte stream type for reading file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Operations the synchronizer needs on a directory tree.
///
/// Paths are full paths (root joined with the entry's relative path).
/// Implementations perform exactly the named operation and make no
/// synchronization decisions of their own.
#[async_trait]
pub trait StorageAccess: Send + Sync {
    /// Get the backend name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Check if a directory exists at path.
    async fn directory_exists(&self, path: &Path) -> Result<bool>;

    /// Check if a regular file exists at path.
    async fn file_exists(&self, path: &Path) -> Result<bool>;

    /// List the direct subdirectories of a directory.
    ///
    /// # Errors
    /// - I/O error if the directory cannot be enumerated
    async fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// List the files directly inside a directory.
    ///
    /// # Errors
    /// - I/O error if the directory cannot be enumerated
    async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Get size and modification time of a file.
    ///
    /// # Errors
    /// - File not found
    async fn file_info(&self, path: &Path) -> Result<FileInfo>;

    /// Open a file for reading as a stream of chunks.
    ///
    /// The underlying handle is released when the stream is dropped.
    async fn open_read(&self, path: &Path) -> Result<ByteStream>;

    /// Create a directory, including missing parents.
    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Delete a directory and everything below it.
    async fn delete_directory_recursively(&self, path: &Path) -> Result<()>;

    /// Delete a file.
    ///
    /// # Errors
    /// - File not found
    /// - Not permitted (e.g., directory)
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Copy a file, replacing the destination if it exists.
    ///
    /// # Preconditions
    /// - Parent directory of `to` must exist
    ///
    /// # Postconditions
    /// - `to` holds the content and modification time of `from`
    async fn copy_file_overwriting(&self, from: &Path, to: &Path) -> Result<()>;
}
