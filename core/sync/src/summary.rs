//! Per-pass outcome counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a single synchronization pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Replica directories created.
    pub directories_created: usize,
    /// Files copied because the replica lacked them.
    pub files_created: usize,
    /// Files copied because their fingerprint differed.
    pub files_modified: usize,
    /// Files copied because their content hash differed.
    pub files_hash_changed: usize,
    /// Files found identical.
    pub files_up_to_date: usize,
    /// Replica files deleted.
    pub files_deleted: usize,
    /// Replica directories deleted with their subtree.
    pub directories_deleted: usize,
    /// Replica files whose source counterpart exists.
    pub files_kept: usize,
    /// Directories whose subdirectories could not be listed.
    pub listing_failures: usize,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl PassSummary {
    /// Total number of files copied for any reason.
    pub fn files_copied(&self) -> usize {
        self.files_created + self.files_modified + self.files_hash_changed
    }

    /// Number of create, copy and delete operations performed.
    pub fn changes(&self) -> usize {
        self.directories_created
            + self.files_copied()
            + self.files_deleted
            + self.directories_deleted
    }

    /// Whether the replica was already in sync.
    pub fn is_unchanged(&self) -> bool {
        self.changes() == 0
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} copied ({} new, {} modified, {} hash changed), {} up to date, \
             {} directories created, {} files deleted, {} directories deleted, \
             {} listing failures in {:?}",
            self.files_copied(),
            self.files_created,
            self.files_modified,
            self.files_hash_changed,
            self.files_up_to_date,
            self.directories_created,
            self.files_deleted,
            self.directories_deleted,
            self.listing_failures,
            self.duration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let summary = PassSummary {
            directories_created: 1,
            files_created: 2,
            files_modified: 1,
            files_hash_changed: 1,
            files_deleted: 3,
            ..Default::default()
        };

        assert_eq!(summary.files_copied(), 4);
        assert_eq!(summary.changes(), 8);
        assert!(!summary.is_unchanged());
        assert!(PassSummary::default().is_unchanged());
    }

    #[test]
    fn test_up_to_date_and_kept_are_not_changes() {
        let summary = PassSummary {
            files_up_to_date: 10,
            files_kept: 10,
            listing_failures: 1,
            ..Default::default()
        };
        assert!(summary.is_unchanged());
        assert!(summary.to_string().contains("10 up to date"));
    }
}
