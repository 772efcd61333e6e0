//! Snapshot store layer
//!
//! Thin contract wrapper around the external content-addressed backup
//! repository. The orchestrators only see the [`SnapshotStore`] trait; the
//! production implementation shells out to restic.

pub mod restic;
pub mod snapshot;

use std::path::{Path, PathBuf};

use crate::error::HostVaultResult;

pub use restic::ResticStore;
pub use snapshot::Snapshot;

/// One file inside a snapshot, as reported by the store's content listing
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    /// Path of the file within the snapshot
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Byte-count summary returned by a backup run
#[derive(Debug, Clone, Default)]
pub struct BackupSummary {
    /// Identifier of the snapshot the run produced
    pub snapshot_id: String,
    /// Files added since the parent snapshot
    pub files_new: u64,
    /// Files changed since the parent snapshot
    pub files_changed: u64,
    /// Total bytes read from the source tree
    pub total_bytes_processed: u64,
    /// Bytes actually written to the repository
    pub data_added: u64,
}

/// Operations against the snapshot repository
///
/// All calls are synchronous and blocking; the repository itself is an
/// opaque deduplicating, encrypted store.
pub trait SnapshotStore {
    /// Initialize a new repository
    fn init(&self) -> HostVaultResult<()>;

    /// Back up `paths` into the repository, excluding `excludes`, tagging
    /// the resulting snapshot with `tags`
    fn backup(
        &self,
        paths: &[PathBuf],
        excludes: &[PathBuf],
        tags: &[String],
    ) -> HostVaultResult<BackupSummary>;

    /// List all snapshots in the repository, oldest first
    fn snapshots(&self) -> HostVaultResult<Vec<Snapshot>>;

    /// Restore the full tree of `snapshot_id` under `target`
    fn restore(&self, snapshot_id: &str, target: &Path) -> HostVaultResult<()>;

    /// List the files contained in `snapshot_id` with their sizes.
    /// Directories and summary lines are not included.
    fn content_listing(&self, snapshot_id: &str) -> HostVaultResult<Vec<ContentEntry>>;

    /// Delete a snapshot and prune unreferenced data
    fn delete(&self, snapshot_id: &str) -> HostVaultResult<()>;

    /// Whether the repository holds no snapshots yet
    fn is_empty(&self) -> HostVaultResult<bool> {
        Ok(self.snapshots()?.is_empty())
    }
}
