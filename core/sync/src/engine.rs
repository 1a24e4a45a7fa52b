//! Tree synchronizer that mirrors a source tree onto a replica tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use mirrorsync_common::{Error, Result, TreeRoot};
use mirrorsync_storage::StorageAccess;

use crate::detector::{ChangeDetector, Staleness};
use crate::reporter::ActivityReporter;
use crate::summary::PassSummary;

/// One-way synchronizer between two directory trees.
///
/// A pass runs two depth-first walks driven by explicit work lists:
/// propagate (rooted at the source) then prune (rooted at the replica).
/// Nothing is retained between passes.
pub struct TreeSynchronizer<S: StorageAccess + ?Sized> {
    /// Storage access for both trees.
    storage: Arc<S>,
    /// Decides whether replica files must be recopied.
    detector: ChangeDetector<S>,
    /// Receives per-entry events.
    reporter: Arc<dyn ActivityReporter>,
}

impl<S: StorageAccess + ?Sized> TreeSynchronizer<S> {
    /// Create a new synchronizer.
    pub fn new(storage: Arc<S>, reporter: Arc<dyn ActivityReporter>) -> Self {
        Self {
            detector: ChangeDetector::new(storage.clone()),
            storage,
            reporter,
        }
    }

    /// Run one complete pass: propagate, then prune.
    ///
    /// # Preconditions
    /// - Both roots must be non-empty
    ///
    /// # Errors
    /// - `InvalidInput` if a root is empty; no storage access happens
    /// - Any failure other than a subdirectory listing failure aborts the pass
    pub async fn synchronize(
        &self,
        source: impl AsRef<Path>,
        replica: impl AsRef<Path>,
    ) -> Result<PassSummary> {
        let source = TreeRoot::new(source.as_ref())
            .map_err(|_| Error::InvalidInput("Source root cannot be empty".to_string()))?;
        let replica = TreeRoot::new(replica.as_ref())
            .map_err(|_| Error::InvalidInput("Replica root cannot be empty".to_string()))?;

        let start = Instant::now();
        let mut summary = PassSummary::default();

        self.reporter.info(&format!(
            "Starting synchronization from '{}' to '{}'.",
            source, replica
        ));

        self.propagate(&source, &replica, &mut summary).await?;
        self.prune(&source, &replica, &mut summary).await?;

        summary.duration = start.elapsed();
        self.reporter.info("Synchronization completed.");
        info!("Pass finished: {}", summary);

        Ok(summary)
    }

    /// Copy new and changed entries from source to replica.
    async fn propagate(
        &self,
        source: &TreeRoot,
        replica: &TreeRoot,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let mut pending = vec![source.path().to_path_buf()];

        while let Some(source_dir) = pending.pop() {
            let relative = source.relative_of(&source_dir)?;
            let replica_dir = replica.resolve(&relative);
            debug!("Propagating {} -> {}", source_dir.display(), replica_dir.display());

            if !self.storage.directory_exists(&replica_dir).await? {
                self.storage.create_directory(&replica_dir).await?;
                summary.directories_created += 1;
                self.reporter.info(&format!(
                    "Created directory '{}' (NEW DIRECTORY).",
                    replica_dir.display()
                ));
            }

            for source_file in self.storage.list_files(&source_dir).await? {
                let replica_file = replica.resolve(&source.relative_of(&source_file)?);
                self.propagate_file(&source_file, &replica_file, summary)
                    .await?;
            }

            if let Some(subdirs) = self.subdirectories(&source_dir, summary).await {
                pending.extend(subdirs);
            }
        }

        Ok(())
    }

    async fn propagate_file(
        &self,
        source_file: &Path,
        replica_file: &Path,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let staleness = self.detector.assess(source_file, replica_file).await?;

        match staleness {
            Staleness::UpToDate => {
                summary.files_up_to_date += 1;
                self.reporter.info(&format!(
                    "File '{}' is up to date. No action needed.",
                    source_file.display()
                ));
                return Ok(());
            }
            Staleness::Missing => summary.files_created += 1,
            Staleness::Modified => summary.files_modified += 1,
            Staleness::HashChanged => summary.files_hash_changed += 1,
        }

        self.storage
            .copy_file_overwriting(source_file, replica_file)
            .await?;
        self.reporter.info(&format!(
            "Copied file '{}' ({}) to '{}'.",
            source_file.display(),
            staleness.label(),
            replica_file.display()
        ));

        Ok(())
    }

    /// Remove replica entries that have no source counterpart.
    async fn prune(
        &self,
        source: &TreeRoot,
        replica: &TreeRoot,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let mut pending = vec![replica.path().to_path_buf()];

        while let Some(replica_dir) = pending.pop() {
            let relative = replica.relative_of(&replica_dir)?;
            let source_dir = source.resolve(&relative);
            debug!("Pruning {} against {}", replica_dir.display(), source_dir.display());

            if !self.storage.directory_exists(&source_dir).await? {
                self.storage
                    .delete_directory_recursively(&replica_dir)
                    .await?;
                summary.directories_deleted += 1;
                self.reporter.info(&format!(
                    "Deleted directory '{}' (REDUNDANT DIRECTORY).",
                    replica_dir.display()
                ));
                continue;
            }
            self.reporter.info(&format!(
                "Directory '{}' exists in source. Checking its contents.",
                replica_dir.display()
            ));

            for replica_file in self.storage.list_files(&replica_dir).await? {
                let source_file = source.resolve(&replica.relative_of(&replica_file)?);

                if self.storage.file_exists(&source_file).await? {
                    summary.files_kept += 1;
                    self.reporter.info(&format!(
                        "File '{}' exists in source.",
                        replica_file.display()
                    ));
                } else {
                    self.storage.delete_file(&replica_file).await?;
                    summary.files_deleted += 1;
                    self.reporter.info(&format!(
                        "Deleted file '{}' (REDUNDANT FILE).",
                        replica_file.display()
                    ));
                }
            }

            if let Some(subdirs) = self.subdirectories(&replica_dir, summary).await {
                pending.extend(subdirs);
            }
        }

        Ok(())
    }

    /// List subdirectories, reporting a failure instead of returning it.
    ///
    /// `None` means the directory's subtree is skipped for this pass.
    async fn subdirectories(&self, dir: &Path, summary: &mut PassSummary) -> Option<Vec<PathBuf>> {
        match self.storage.list_subdirectories(dir).await {
            Ok(subdirs) => Some(subdirs),
            Err(e) => {
                summary.listing_failures += 1;
                self.reporter.error(
                    &format!(
                        "Failed to get directories from '{}'. Skipping this directory.",
                        dir.display()
                    ),
                    Some(&e),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{ActivityLevel, RecordingReporter};
    use chrono::{Duration, Utc};
    use mirrorsync_storage::{MemoryStorage, Operation};

    fn setup() -> (
        Arc<MemoryStorage>,
        Arc<RecordingReporter>,
        TreeSynchronizer<MemoryStorage>,
    ) {
        let storage = Arc::new(MemoryStorage::new());
        let reporter = Arc::new(RecordingReporter::new());
        let engine = TreeSynchronizer::new(storage.clone(), reporter.clone());
        (storage, reporter, engine)
    }

    fn copy(from: &str, to: &str) -> Operation {
        Operation::CopyFileOverwriting {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        }
    }

    fn opened(storage: &MemoryStorage) -> usize {
        storage
            .operations()
            .iter()
            .filter(|op| matches!(op, Operation::OpenRead(_)))
            .count()
    }

    #[tokio::test]
    async fn test_new_file_is_copied_to_replica() {
        let (storage, _reporter, engine) = setup();
        storage.add_file("/Source/file1.txt", b"one".to_vec());

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(storage.count(&copy("/Source/file1.txt", "/Replica/file1.txt")), 1);
        assert_eq!(storage.contents("/Replica/file1.txt"), Some(b"one".to_vec()));
        assert_eq!(summary.files_created, 1);
        assert_eq!(summary.directories_created, 1);
    }

    #[tokio::test]
    async fn test_redundant_file_is_deleted() {
        let (storage, reporter, engine) = setup();
        storage.add_directory("/Source");
        storage.add_file("/Replica/file2.txt", b"old".to_vec());

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(
            storage.count(&Operation::DeleteFile(PathBuf::from("/Replica/file2.txt"))),
            1
        );
        assert_eq!(summary.files_deleted, 1);
        assert!(reporter.contains("(REDUNDANT FILE)"));
    }

    #[tokio::test]
    async fn test_modified_files_are_recopied() {
        let (storage, _reporter, engine) = setup();
        let now = Utc::now();
        storage.add_file_with_modified("/Source/fileSize.txt", vec![1; 100], now);
        storage.add_file_with_modified("/Replica/fileSize.txt", vec![1; 50], now);
        storage.add_file_with_modified("/Source/fileDateTime.txt", vec![2; 100], now + Duration::minutes(1));
        storage.add_file_with_modified("/Replica/fileDateTime.txt", vec![2; 100], now);
        storage.add_file_with_modified("/Source/fileHash.txt", vec![1, 2, 3], now);
        storage.add_file_with_modified("/Replica/fileHash.txt", vec![4, 5, 6], now);

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(storage.count(&copy("/Source/fileSize.txt", "/Replica/fileSize.txt")), 1);
        assert_eq!(
            storage.count(&copy("/Source/fileDateTime.txt", "/Replica/fileDateTime.txt")),
            1
        );
        assert_eq!(storage.count(&copy("/Source/fileHash.txt", "/Replica/fileHash.txt")), 1);
        assert_eq!(summary.files_modified, 2);
        assert_eq!(summary.files_hash_changed, 1);
        assert_eq!(storage.contents("/Replica/fileHash.txt"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_does_not_hash() {
        let (storage, _reporter, engine) = setup();
        let now = Utc::now();
        storage.add_file_with_modified("/Source/fileSize.txt", vec![0; 100], now);
        storage.add_file_with_modified("/Replica/fileSize.txt", vec![0; 50], now);

        engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(storage.count(&copy("/Source/fileSize.txt", "/Replica/fileSize.txt")), 1);
        assert_eq!(opened(&storage), 0);
    }

    #[tokio::test]
    async fn test_new_directory_is_created() {
        let (storage, reporter, engine) = setup();
        storage.add_directory("/Source/NewFolder");
        storage.add_directory("/Replica");

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(
            storage.count(&Operation::CreateDirectory(PathBuf::from("/Replica/NewFolder"))),
            1
        );
        assert_eq!(summary.directories_created, 1);
        assert!(reporter.contains("(NEW DIRECTORY)"));
    }

    #[tokio::test]
    async fn test_redundant_directory_is_deleted_without_descending() {
        let (storage, reporter, engine) = setup();
        storage.add_directory("/Source");
        storage.add_file("/Replica/OldFolder/inner/deep.txt", b"x".to_vec());
        storage.add_file("/Replica/OldFolder/top.txt", b"y".to_vec());

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(
            storage.count(&Operation::DeleteDirectoryRecursively(PathBuf::from(
                "/Replica/OldFolder"
            ))),
            1
        );
        assert_eq!(summary.directories_deleted, 1);
        assert_eq!(summary.files_deleted, 0);
        assert!(!reporter.contains("deep.txt"));
        assert!(!reporter.contains("top.txt"));
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let (storage, _reporter, engine) = setup();
        storage.add_file("/Source/a.txt", b"a".to_vec());
        storage.add_file("/Source/dir/b.txt", b"b".to_vec());
        storage.add_file("/Source/dir/nested/c.txt", b"c".to_vec());
        storage.add_file("/Replica/stale.txt", b"stale".to_vec());

        let first = engine.synchronize("/Source", "/Replica").await.unwrap();
        assert!(!first.is_unchanged());

        storage.clear_operations();
        let second = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert!(second.is_unchanged());
        assert_eq!(second.files_up_to_date, 3);
        assert_eq!(second.files_kept, 3);
        assert!(storage
            .operations()
            .iter()
            .all(|op| matches!(op, Operation::OpenRead(_))));
    }

    #[tokio::test]
    async fn test_relative_paths_are_preserved() {
        let (storage, _reporter, engine) = setup();
        storage.add_file("/data/src/x/y/z.txt", b"z".to_vec());

        engine.synchronize("/data/src", "/backup/dst").await.unwrap();

        assert_eq!(storage.contents("/backup/dst/x/y/z.txt"), Some(b"z".to_vec()));
        assert!(storage.directory_exists(Path::new("/backup/dst/x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_failure_is_contained() {
        let (storage, reporter, engine) = setup();
        storage.add_file("/Source/locked/visible.txt", b"v".to_vec());
        storage.add_file("/Source/locked/hidden/h.txt", b"h".to_vec());
        storage.add_file("/Source/open/sibling.txt", b"s".to_vec());
        storage.add_file("/Source/root.txt", b"r".to_vec());
        storage.fail_listing("/Source/locked");

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(storage.contents("/Replica/locked/visible.txt"), Some(b"v".to_vec()));
        assert_eq!(storage.contents("/Replica/open/sibling.txt"), Some(b"s".to_vec()));
        assert_eq!(storage.contents("/Replica/root.txt"), Some(b"r".to_vec()));
        assert_eq!(storage.contents("/Replica/locked/hidden/h.txt"), None);
        assert_eq!(summary.listing_failures, 1);

        let errors: Vec<_> = reporter
            .activities()
            .into_iter()
            .filter(|a| a.level == ActivityLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("/Source/locked"));
        assert!(errors[0].fault.is_some());
    }

    #[tokio::test]
    async fn test_empty_roots_are_rejected() {
        let (storage, reporter, engine) = setup();

        let result = engine.synchronize("", "/Replica").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = engine.synchronize("/Source", "").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        assert!(storage.operations().is_empty());
        assert!(reporter.activities().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_aborts_pass() {
        let (storage, _reporter, engine) = setup();
        let now = Utc::now();
        storage.add_file_with_modified("/Source/a.txt", b"a".to_vec(), now);
        storage.add_file_with_modified("/Replica/a.txt", b"a".to_vec(), now);
        storage.fail_reads("/Source/a.txt");

        let result = engine.synchronize("/Source", "/Replica").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let memory = Arc::new(MemoryStorage::new());
        memory.add_file("/Source/a.txt", b"a".to_vec());
        let storage: Arc<dyn StorageAccess> = memory.clone();
        let engine = TreeSynchronizer::new(storage, Arc::new(RecordingReporter::new()));

        let summary = engine.synchronize("/Source", "/Replica").await.unwrap();

        assert_eq!(summary.files_created, 1);
        assert_eq!(memory.contents("/Replica/a.txt"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn test_pass_is_bracketed_by_start_and_completion() {
        let (storage, reporter, engine) = setup();
        storage.add_file("/Source/a.txt", b"a".to_vec());

        engine.synchronize("/Source", "/Replica").await.unwrap();

        let infos = reporter.messages(ActivityLevel::Info);
        assert!(infos.first().unwrap().starts_with("Starting synchronization"));
        assert_eq!(infos.last().unwrap(), "Synchronization completed.");
    }
}
