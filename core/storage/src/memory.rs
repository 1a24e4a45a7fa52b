//! In-memory storage access for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::{ByteStream, FileInfo, StorageAccess};
use mirrorsync_common::{Error, Result};

/// Chunk size used when streaming file contents.
const READ_CHUNK_SIZE: usize = 4096;

/// In-memory storage entry.
#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Vec<u8>,
        modified: DateTime<Utc>,
    },
    Directory,
}

/// A mutating or reading operation performed through [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateDirectory(PathBuf),
    DeleteDirectoryRecursively(PathBuf),
    DeleteFile(PathBuf),
    CopyFileOverwriting { from: PathBuf, to: PathBuf },
    OpenRead(PathBuf),
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<PathBuf, Entry>,
    operations: Vec<Operation>,
    failing_listings: HashSet<PathBuf>,
    failing_reads: HashSet<PathBuf>,
}

/// In-memory storage access.
///
/// Useful for testing. Entries are keyed by full path, every mutating call
/// and every `open_read` is recorded, and listing or reading can be made to
/// fail for chosen paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a directory and any missing parents without recording an operation.
    pub fn add_directory(&self, path: impl AsRef<Path>) {
        Self::insert_directory_all(&mut self.write().entries, path.as_ref());
    }

    /// Add a file modified "now", creating missing parents.
    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        self.add_file_with_modified(path, data, Utc::now());
    }

    /// Add a file with an explicit modification time, creating missing parents.
    pub fn add_file_with_modified(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Vec<u8>>,
        modified: DateTime<Utc>,
    ) {
        let path = path.as_ref();
        let mut state = self.write();
        if let Some(parent) = path.parent() {
            Self::insert_directory_all(&mut state.entries, parent);
        }
        state.entries.insert(
            path.to_path_buf(),
            Entry::File {
                data: data.into(),
                modified,
            },
        );
    }

    /// Change the modification time of an existing file.
    pub fn set_modified(&self, path: impl AsRef<Path>, time: DateTime<Utc>) -> Result<()> {
        let path = path.as_ref();
        match self.write().entries.get_mut(path) {
            Some(Entry::File { modified, .. }) => {
                *modified = time;
                Ok(())
            }
            _ => Err(Error::NotFound(format!("File not found: {}", path.display()))),
        }
    }

    /// Make `list_subdirectories` fail for this directory.
    pub fn fail_listing(&self, path: impl AsRef<Path>) {
        self.write()
            .failing_listings
            .insert(path.as_ref().to_path_buf());
    }

    /// Make `open_read` fail for this file.
    pub fn fail_reads(&self, path: impl AsRef<Path>) {
        self.write().failing_reads.insert(path.as_ref().to_path_buf());
    }

    /// Content of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.read().entries.get(path.as_ref()) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Operations recorded so far, in call order.
    pub fn operations(&self) -> Vec<Operation> {
        self.read().operations.clone()
    }

    /// Number of times an operation was recorded.
    pub fn count(&self, operation: &Operation) -> usize {
        self.read()
            .operations
            .iter()
            .filter(|op| *op == operation)
            .count()
    }

    /// Forget recorded operations.
    pub fn clear_operations(&self) {
        self.write().operations.clear();
    }

    fn insert_directory_all(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(Entry::Directory);
        }
    }

    fn ensure_directory(state: &State, path: &Path) -> Result<()> {
        match state.entries.get(path) {
            Some(Entry::Directory) => Ok(()),
            Some(Entry::File { .. }) => Err(Error::InvalidInput(format!(
                "Not a directory: {}",
                path.display()
            ))),
            None => Err(Error::NotFound(format!(
                "Directory not found: {}",
                path.display()
            ))),
        }
    }

    fn children<'a>(
        state: &'a State,
        path: &'a Path,
    ) -> impl Iterator<Item = (&'a PathBuf, &'a Entry)> + 'a {
        state
            .entries
            .iter()
            .filter(move |(key, _)| key.parent() == Some(path))
    }
}

#[async_trait]
impl StorageAccess for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn directory_exists(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.read().entries.get(path), Some(Entry::Directory)))
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        Ok(matches!(
            self.read().entries.get(path),
            Some(Entry::File { .. })
        ))
    }

    async fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.read();
        if state.failing_listings.contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("Access denied: {}", path.display()),
            )));
        }
        Self::ensure_directory(&state, path)?;

        Ok(Self::children(&state, path)
            .filter(|(_, entry)| matches!(entry, Entry::Directory))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.read();
        Self::ensure_directory(&state, path)?;

        Ok(Self::children(&state, path)
            .filter(|(_, entry)| matches!(entry, Entry::File { .. }))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn file_info(&self, path: &Path) -> Result<FileInfo> {
        match self.read().entries.get(path) {
            Some(Entry::File { data, modified }) => Ok(FileInfo {
                length: data.len() as u64,
                modified: *modified,
            }),
            Some(Entry::Directory) => Err(Error::InvalidInput(format!(
                "Not a file: {}",
                path.display()
            ))),
            None => Err(Error::NotFound(format!("File not found: {}", path.display()))),
        }
    }

    async fn open_read(&self, path: &Path) -> Result<ByteStream> {
        let mut state = self.write();
        state.operations.push(Operation::OpenRead(path.to_path_buf()));

        if state.failing_reads.contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Read failed: {}", path.display()),
            )));
        }

        let data = match state.entries.get(path) {
            Some(Entry::File { data, .. }) => data.clone(),
            Some(Entry::Directory) => {
                return Err(Error::InvalidInput("Cannot read directory".to_string()));
            }
            None => {
                return Err(Error::NotFound(format!("File not found: {}", path.display())));
            }
        };

        let chunks: Vec<Result<Bytes>> = data
            .chunks(READ_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        let mut state = self.write();
        state
            .operations
            .push(Operation::CreateDirectory(path.to_path_buf()));

        if let Some(Entry::File { .. }) = state.entries.get(path) {
            return Err(Error::AlreadyExists(format!(
                "File exists at {}",
                path.display()
            )));
        }
        Self::insert_directory_all(&mut state.entries, path);
        Ok(())
    }

    async fn delete_directory_recursively(&self, path: &Path) -> Result<()> {
        let mut state = self.write();
        state
            .operations
            .push(Operation::DeleteDirectoryRecursively(path.to_path_buf()));

        Self::ensure_directory(&state, path)?;
        state.entries.retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let mut state = self.write();
        state.operations.push(Operation::DeleteFile(path.to_path_buf()));

        match state.entries.get(path) {
            Some(Entry::File { .. }) => {
                state.entries.remove(path);
                Ok(())
            }
            Some(Entry::Directory) => Err(Error::InvalidInput(format!(
                "Use delete_directory_recursively for directories: {}",
                path.display()
            ))),
            None => Err(Error::NotFound(format!("File not found: {}", path.display()))),
        }
    }

    async fn copy_file_overwriting(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.write();
        state.operations.push(Operation::CopyFileOverwriting {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });

        let entry = match state.entries.get(from) {
            Some(entry @ Entry::File { .. }) => entry.clone(),
            Some(Entry::Directory) => {
                return Err(Error::InvalidInput(format!(
                    "Cannot copy directory: {}",
                    from.display()
                )));
            }
            None => {
                return Err(Error::NotFound(format!(
                    "Source not found: {}",
                    from.display()
                )));
            }
        };

        if let Some(parent) = to.parent() {
            Self::ensure_directory(&state, parent)?;
        }
        if let Some(Entry::Directory) = state.entries.get(to) {
            return Err(Error::AlreadyExists(format!(
                "Directory exists at {}",
                to.display()
            )));
        }

        state.entries.insert(to.to_path_buf(), entry);
        Ok(())
    }
}
