//! Backup orchestration
//!
//! Linear sequence: space preflight, stop the running containers (the
//! daemon stays up, backup does not touch its storage), run the full-tree
//! backup, restart exactly the stopped containers. The restart happens
//! whether or not the backup succeeded.

use log::info;

use super::space::{SpaceCheck, SpaceEstimator};
use crate::config::settings::Settings;
use crate::error::{HostVaultError, HostVaultResult};
use crate::runtime::{CaptureScope, ContainerRuntime, WorkloadState};
use crate::store::{BackupSummary, SnapshotStore};

/// Sequences one backup operation
pub struct BackupOrchestrator<'a, S, R> {
    store: &'a S,
    runtime: &'a R,
    settings: &'a Settings,
}

impl<'a, S: SnapshotStore, R: ContainerRuntime> BackupOrchestrator<'a, S, R> {
    pub fn new(store: &'a S, runtime: &'a R, settings: &'a Settings) -> Self {
        Self {
            store,
            runtime,
            settings,
        }
    }

    /// Run the backup. Returns the store's byte-count summary.
    pub fn run(&self) -> HostVaultResult<BackupSummary> {
        let check = self.preflight()?;
        info!(
            "Space preflight passed: need {} bytes, have {}",
            check.required_bytes, check.available_bytes
        );

        let state = WorkloadState::capture(self.runtime, CaptureScope::ContainersOnly)?;

        // The containers come back regardless of how the backup went.
        let backup_result = self.store.backup(
            &self.settings.backup_paths,
            &self.settings.exclude_paths,
            &self.tags(),
        );
        let resume_result = state.resume(self.runtime);

        let summary = backup_result?;
        resume_result?;

        info!(
            "Backup complete: snapshot {}, {} bytes processed, {} bytes added",
            summary.snapshot_id, summary.total_bytes_processed, summary.data_added
        );

        Ok(summary)
    }

    /// Check free space on the repository filesystem before touching
    /// anything
    pub fn preflight(&self) -> HostVaultResult<SpaceCheck> {
        let repo_is_empty = self.store.is_empty()?;
        let check = SpaceEstimator::new(self.settings).estimate_backup(repo_is_empty);

        if !check.sufficient() {
            return Err(HostVaultError::InsufficientSpace {
                required: check.required_bytes,
                available: check.available_bytes,
            });
        }

        Ok(check)
    }

    /// Snapshot tags: the local hostname plus any configured extras
    fn tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if let Ok(name) = hostname::get() {
            tags.push(name.to_string_lossy().into_owned());
        }
        tags.extend(self.settings.tags.iter().cloned());
        tags
    }
}
