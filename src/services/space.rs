//! Disk-space preflight estimation
//!
//! Predicts required versus available capacity before a backup or restore
//! runs. The formulas differ per direction and per repository state: a first
//! backup pays for a full copy of the source tree, later backups only write
//! deltas, and a restore pays for the snapshot's full content.

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::settings::Settings;
use crate::store::ContentEntry;

/// Safety buffer applied to a first backup (percent of the scanned tree)
const BACKUP_BUFFER_PERCENT: u64 = 110;

/// Safety buffer applied to a restore (percent of the snapshot content)
const RESTORE_BUFFER_PERCENT: u64 = 105;

/// Required versus available capacity for one pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceCheck {
    /// Bytes the operation is expected to need
    pub required_bytes: u64,
    /// Bytes currently free on the target filesystem; zero when the
    /// reading failed
    pub available_bytes: u64,
}

impl SpaceCheck {
    /// Whether the operation may proceed
    pub fn sufficient(&self) -> bool {
        self.available_bytes >= self.required_bytes
    }
}

/// Computes space requirements from the configured source set
pub struct SpaceEstimator<'a> {
    settings: &'a Settings,
}

impl<'a> SpaceEstimator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Estimate the space a backup needs on the repository filesystem.
    ///
    /// An empty repository pays for the whole source tree (scanned with the
    /// same exclusion set the backup itself uses) plus a safety buffer; a
    /// non-empty repository only needs the configured free-space floor,
    /// since incremental backups write deltas.
    pub fn estimate_backup(&self, repo_is_empty: bool) -> SpaceCheck {
        let required_bytes = if repo_is_empty {
            let scanned = scan_used_bytes(&self.settings.backup_paths, &self.settings.exclude_paths);
            with_buffer(scanned, BACKUP_BUFFER_PERCENT)
        } else {
            self.settings.min_free_bytes
        };

        SpaceCheck {
            required_bytes,
            available_bytes: available_bytes(&self.settings.repository),
        }
    }

    /// Estimate the space a restore needs on the root filesystem, from the
    /// target snapshot's content listing
    pub fn estimate_restore(&self, listing: &[ContentEntry]) -> SpaceCheck {
        let content: u64 = listing.iter().map(|entry| entry.size).sum();

        SpaceCheck {
            required_bytes: with_buffer(content, RESTORE_BUFFER_PERCENT),
            available_bytes: available_bytes(Path::new("/")),
        }
    }
}

/// Apply a percentage buffer with integer arithmetic
fn with_buffer(bytes: u64, percent: u64) -> u64 {
    (bytes as u128 * percent as u128 / 100) as u64
}

/// Recursive size of `paths`, skipping anything under `excludes`.
///
/// Approximate by design: unreadable entries are skipped rather than
/// reported, keeping the scan cheap on a live system.
fn scan_used_bytes(paths: &[PathBuf], excludes: &[PathBuf]) -> u64 {
    let mut total = 0u64;

    for root in paths {
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.path(), excludes));

        for entry in walker.flatten() {
            if entry.file_type().is_file() {
                if let Ok(metadata) = entry.metadata() {
                    total = total.saturating_add(metadata.len());
                }
            }
        }
    }

    total
}

fn is_excluded(path: &Path, excludes: &[PathBuf]) -> bool {
    excludes.iter().any(|exclude| path.starts_with(exclude))
}

/// Free bytes on the filesystem holding `path`.
///
/// A failed reading is reported as zero rather than an error; the caller
/// surfaces both numbers and aborts.
fn available_bytes(path: &Path) -> u64 {
    match nix::sys::statvfs::statvfs(path) {
        Ok(stat) => (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64),
        Err(e) => {
            debug!("statvfs on {} failed: {}", path.display(), e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings_for(temp: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.repository = temp.path().to_path_buf();
        settings.backup_paths = vec![temp.path().join("data")];
        settings.exclude_paths = vec![temp.path().join("data").join("skip")];
        settings.min_free_bytes = 4096;
        settings
    }

    #[test]
    fn test_first_backup_scans_tree_with_buffer() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir_all(data.join("skip")).unwrap();
        fs::write(data.join("kept.bin"), vec![0u8; 1000]).unwrap();
        fs::write(data.join("skip").join("ignored.bin"), vec![0u8; 50_000]).unwrap();

        let settings = settings_for(&temp);
        let check = SpaceEstimator::new(&settings).estimate_backup(true);

        // 1000 bytes scanned, excluded subtree not counted
        assert_eq!(check.required_bytes, 1100);
    }

    #[test]
    fn test_incremental_backup_uses_fixed_floor() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("huge.bin"), vec![0u8; 100_000]).unwrap();

        let settings = settings_for(&temp);
        let check = SpaceEstimator::new(&settings).estimate_backup(false);

        // Tree size is irrelevant once the repository has snapshots
        assert_eq!(check.required_bytes, 4096);
    }

    #[test]
    fn test_restore_sums_listing_with_buffer() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);

        let listing = vec![
            ContentEntry {
                path: PathBuf::from("/a"),
                size: 1024,
            },
            ContentEntry {
                path: PathBuf::from("/b"),
                size: 2048,
            },
            ContentEntry {
                path: PathBuf::from("/c"),
                size: 4096,
            },
        ];

        let check = SpaceEstimator::new(&settings).estimate_restore(&listing);

        assert_eq!(check.required_bytes, 7526);
    }

    #[test]
    fn test_with_buffer_rounds_down() {
        assert_eq!(with_buffer(7168, 105), 7526);
        assert_eq!(with_buffer(1000, 110), 1100);
        assert_eq!(with_buffer(0, 110), 0);
    }

    #[test]
    fn test_available_bytes_reports_zero_on_bad_path() {
        assert_eq!(
            available_bytes(Path::new("/nonexistent/hostvault-test-path")),
            0
        );
    }

    #[test]
    fn test_available_bytes_positive_on_real_path() {
        let temp = TempDir::new().unwrap();
        assert!(available_bytes(temp.path()) > 0);
    }

    #[test]
    fn test_zero_available_fails_check_without_panicking() {
        let check = SpaceCheck {
            required_bytes: 10,
            available_bytes: 0,
        };
        assert!(!check.sufficient());
    }
}
