//! Restore orchestration
//!
//! Sequences a whole-machine restore: space preflight, operator
//! confirmation, workload capture with full runtime stop, staged restore
//! into a fresh directory, atomic swap of the runtime data directory,
//! selective sync into the live root, cleanup, resume.
//!
//! The staging directory and the stopped runtime are held by a scoped
//! guard. Any error return and any interrupt signal inside the guarded
//! window roll both back: the staging directory is removed and the runtime
//! restarted if it was running before. The guard is disarmed only once
//! cleanup has completed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{error, info, warn};

use super::space::{SpaceCheck, SpaceEstimator};
use crate::config::settings::Settings;
use crate::error::{HostVaultError, HostVaultResult};
use crate::runtime::{CaptureScope, ContainerRuntime, WorkloadState};
use crate::store::SnapshotStore;
use crate::sync::FileSync;

/// What a completed restore did
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// Identifier of the restored snapshot
    pub snapshot_id: String,
    /// Whether the runtime data directory was swapped in from the snapshot
    pub runtime_data_swapped: bool,
    /// Roots synced with the mirror policy
    pub mirrored_roots: Vec<PathBuf>,
    /// Roots synced with the additive policy
    pub additive_roots: Vec<PathBuf>,
}

/// Sequences one restore operation
pub struct RestoreOrchestrator<'a, S, R, F> {
    store: &'a S,
    runtime: &'a R,
    sync: &'a F,
    settings: &'a Settings,
}

impl<'a, S, R, F> RestoreOrchestrator<'a, S, R, F>
where
    S: SnapshotStore,
    R: ContainerRuntime + Clone + Send + 'static,
    F: FileSync,
{
    pub fn new(store: &'a S, runtime: &'a R, sync: &'a F, settings: &'a Settings) -> Self {
        Self {
            store,
            runtime,
            sync,
            settings,
        }
    }

    /// Run the restore.
    ///
    /// `confirm` is called once with the passed space check and must return
    /// `true` for the destructive phase to begin; anything else aborts with
    /// no side effects.
    pub fn run<C>(&self, snapshot_id: &str, confirm: C) -> HostVaultResult<RestoreOutcome>
    where
        C: FnOnce(&SpaceCheck) -> bool,
    {
        // Space preflight against the root filesystem, which is where the
        // restored tree ultimately lands.
        let listing = self.store.content_listing(snapshot_id)?;
        let check = SpaceEstimator::new(self.settings).estimate_restore(&listing);
        if !check.sufficient() {
            return Err(HostVaultError::InsufficientSpace {
                required: check.required_bytes,
                available: check.available_bytes,
            });
        }

        if !confirm(&check) {
            return Err(HostVaultError::Aborted(
                "operator declined confirmation".into(),
            ));
        }

        info!("Restoring snapshot {}", snapshot_id);

        let state = WorkloadState::capture(self.runtime, CaptureScope::FullRuntime)?;

        let staging = match self.create_staging() {
            Ok(dir) => dir,
            Err(e) => {
                // The runtime is already down; bring it back before bailing.
                if let Err(resume_err) = state.resume(self.runtime) {
                    error!("Failed to resume runtime after staging error: {}", resume_err);
                }
                return Err(e);
            }
        };

        let guard = StagingGuard::arm(staging.clone(), state.clone(), self.runtime.clone());

        self.store.restore(snapshot_id, &staging)?;
        info!("Staged restore complete in {}", staging.display());

        let runtime_data_swapped = self.swap_runtime_data(&staging)?;
        let (mirrored_roots, additive_roots) = self.selective_sync(&staging)?;

        guard.finish();
        state.resume(self.runtime)?;

        info!("Restore of snapshot {} complete", snapshot_id);

        Ok(RestoreOutcome {
            snapshot_id: snapshot_id.to_string(),
            runtime_data_swapped,
            mirrored_roots,
            additive_roots,
        })
    }

    /// Create the uniquely named staging directory for this attempt
    fn create_staging(&self) -> HostVaultResult<PathBuf> {
        let now = Utc::now();
        let name = format!(
            "restore-{}-{:03}",
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_millis()
        );
        let dir = self.settings.staging_base.join(name);

        fs::create_dir_all(&dir).map_err(|e| {
            HostVaultError::Io(format!(
                "Failed to create staging directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(dir)
    }

    /// Replace the live runtime data directory with the staged one.
    ///
    /// The directory is swapped wholesale (remove live, move staged into
    /// place): runtime storage uses internal references a file-level sync
    /// could corrupt. A snapshot without this subtree is fine; older
    /// snapshots and hosts without the runtime legitimately lack it.
    fn swap_runtime_data(&self, staging: &Path) -> HostVaultResult<bool> {
        let data_dir = &self.settings.runtime_data_dir;
        let staged = staging.join(relative(data_dir));

        if !staged.exists() {
            warn!(
                "Snapshot has no runtime data directory for {}; skipping swap",
                data_dir.display()
            );
            return Ok(false);
        }

        if data_dir.exists() {
            fs::remove_dir_all(data_dir).map_err(|e| {
                HostVaultError::Io(format!(
                    "Failed to remove live runtime data directory {}: {}",
                    data_dir.display(),
                    e
                ))
            })?;
        }

        if let Some(parent) = data_dir.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HostVaultError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        fs::rename(&staged, data_dir).map_err(|e| {
            HostVaultError::Io(format!(
                "Failed to move staged runtime data into {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        info!("Swapped runtime data directory {}", data_dir.display());
        Ok(true)
    }

    /// Merge the remaining staged tree into the live root.
    ///
    /// Mirror policy for user/application roots (deletions propagate),
    /// additive policy for core OS roots, and a fixed exclusion set that
    /// neither policy touches. Roots absent from the snapshot are skipped.
    fn selective_sync(&self, staging: &Path) -> HostVaultResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut excludes = self.settings.sync_exclusions.clone();
        // The runtime data directory was already swapped wholesale; the
        // mirror pass must not delete it out from under the fresh tree.
        excludes.push(self.settings.runtime_data_dir.clone());
        excludes.push(self.settings.staging_base.clone());
        excludes.push(self.settings.repository.clone());

        let mut mirrored = Vec::new();
        for root in &self.settings.mirror_paths {
            let staged = staging.join(relative(root));
            if !staged.exists() {
                continue;
            }
            self.sync
                .mirror(&staged, root, &excludes_for_root(root, &excludes))?;
            mirrored.push(root.clone());
        }

        let mut additive = Vec::new();
        for root in &self.settings.additive_paths {
            let staged = staging.join(relative(root));
            if !staged.exists() {
                continue;
            }
            self.sync.additive(&staged, root)?;
            additive.push(root.clone());
        }

        Ok((mirrored, additive))
    }
}

/// A path relative to the filesystem root, suitable for joining onto the
/// staging directory
fn relative(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Re-anchor the exclusions that fall under `root` so rsync matches them
/// against the transfer root rather than the filesystem root
fn excludes_for_root(root: &Path, excludes: &[PathBuf]) -> Vec<PathBuf> {
    excludes
        .iter()
        .filter_map(|exclude| exclude.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| Path::new("/").join(rel))
        .collect()
}

/// Holds the staging directory and the stopped runtime as one resource.
///
/// While armed, an error return (Drop) or an interrupt signal rolls both
/// back. `finish` is the normal-path cleanup: staging removal only, with
/// the resume handled by the caller as its own step.
struct StagingGuard<R: ContainerRuntime + Clone + Send + 'static> {
    staging: PathBuf,
    state: WorkloadState,
    runtime: R,
    token: u64,
    armed: bool,
}

impl<R: ContainerRuntime + Clone + Send + 'static> StagingGuard<R> {
    fn arm(staging: PathBuf, state: WorkloadState, runtime: R) -> Self {
        let token = {
            let staging = staging.clone();
            let state = state.clone();
            let runtime = runtime.clone();
            interrupt::arm(Box::new(move || rollback(&staging, &state, &runtime)))
        };

        Self {
            staging,
            state,
            runtime,
            token,
            armed: true,
        }
    }

    fn finish(mut self) {
        self.armed = false;
        interrupt::disarm(self.token);
        remove_staging(&self.staging);
    }
}

impl<R: ContainerRuntime + Clone + Send + 'static> Drop for StagingGuard<R> {
    fn drop(&mut self) {
        if self.armed {
            interrupt::disarm(self.token);
            rollback(&self.staging, &self.state, &self.runtime);
        }
    }
}

/// Undo a partial restore attempt: drop the staging directory and bring
/// the runtime back if the capture stopped it
fn rollback<R: ContainerRuntime>(staging: &Path, state: &WorkloadState, runtime: &R) {
    remove_staging(staging);
    if let Err(e) = state.resume(runtime) {
        error!("Failed to resume container runtime during rollback: {}", e);
    }
}

fn remove_staging(staging: &Path) {
    match fs::remove_dir_all(staging) {
        Ok(()) => info!("Removed staging directory {}", staging.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove staging directory {}: {}",
            staging.display(),
            e
        ),
    }
}

pub mod interrupt {
    //! Process-wide interrupt hook for the restore window.
    //!
    //! The orchestrator arms a cleanup action when the staging directory is
    //! created and disarms it after cleanup. A SIGINT inside that window
    //! runs the action before the process exits; outside it, the process
    //! just terminates.

    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, Once, OnceLock};

    use log::error;

    type CleanupFn = Box<dyn FnOnce() + Send>;

    struct Armed {
        token: u64,
        cleanup: CleanupFn,
    }

    static INSTALL: Once = Once::new();
    static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

    fn slot() -> &'static Mutex<Option<Armed>> {
        static SLOT: OnceLock<Mutex<Option<Armed>>> = OnceLock::new();
        SLOT.get_or_init(|| Mutex::new(None))
    }

    /// Install the signal hook. Idempotent.
    pub fn install() {
        INSTALL.call_once(|| {
            if let Err(e) = ctrlc::set_handler(|| {
                if let Some(armed) = slot().lock().unwrap().take() {
                    (armed.cleanup)();
                }
                std::process::exit(130);
            }) {
                error!("Failed to install interrupt handler: {}", e);
            }
        });
    }

    pub(super) fn arm(cleanup: CleanupFn) -> u64 {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::SeqCst);
        *slot().lock().unwrap() = Some(Armed { token, cleanup });
        token
    }

    pub(super) fn disarm(token: u64) {
        let mut armed = slot().lock().unwrap();
        if armed.as_ref().map(|a| a.token) == Some(token) {
            *armed = None;
        }
    }
}
