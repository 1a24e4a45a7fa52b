//! Local filesystem storage access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use futures::TryStreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::provider::{ByteStream, FileInfo, StorageAccess};
use mirrorsync_common::{Error, Result};

/// Local filesystem storage access.
///
/// Operates directly on the paths it is given. Symbolic links are reported
/// neither as files nor as directories.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    /// Create a new local storage accessor.
    pub fn new() -> Self {
        Self
    }

    /// Collect the entries of a directory whose file type matches `keep`.
    async fn list_entries(
        &self,
        path: &Path,
        keep: fn(&std::fs::FileType) -> bool,
    ) -> Result<Vec<PathBuf>> {
        let mut results = Vec::new();
        let mut entries = fs::read_dir(path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if keep(&file_type) {
                results.push(entry.path());
            }
        }

        Ok(results)
    }

    /// Look up metadata, mapping "not found" to `None`.
    async fn metadata_if_present(&self, path: &Path) -> Result<Option<std::fs::Metadata>> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageAccess for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn directory_exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .metadata_if_present(path)
            .await?
            .is_some_and(|meta| meta.is_dir()))
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .metadata_if_present(path)
            .await?
            .is_some_and(|meta| meta.is_file()))
    }

    async fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_entries(path, std::fs::FileType::is_dir).await
    }

    async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_entries(path, std::fs::FileType::is_file).await
    }

    async fn file_info(&self, path: &Path) -> Result<FileInfo> {
        let Some(meta) = self.metadata_if_present(path).await? else {
            return Err(Error::NotFound(format!("File not found: {}", path.display())));
        };

        if !meta.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        let modified: DateTime<Utc> = meta.modified()?.into();
        Ok(FileInfo {
            length: meta.len(),
            modified,
        })
    }

    async fn open_read(&self, path: &Path) -> Result<ByteStream> {
        let file = fs::File::open(path).await?;
        let stream = ReaderStream::new(file).map_err(Error::from);
        Ok(Box::pin(stream))
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn delete_directory_recursively(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }

    async fn copy_file_overwriting(&self, from: &Path, to: &Path) -> Result<()> {
        let source_meta = fs::metadata(from).await?;
        if source_meta.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Cannot copy directory: {}",
                from.display()
            )));
        }

        let bytes = fs::copy(from, to).await?;
        debug!("Copied {} bytes from {} to {}", bytes, from.display(), to.display());

        // Carry the modification time over so the next pass sees equal fingerprints.
        let mtime = FileTime::from_last_modification_time(&source_meta);
        let destination = to.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&destination, mtime))
            .await
            .map_err(|e| Error::Storage(format!("Failed to set modification time: {}", e)))??;

        Ok(())
    }
}
