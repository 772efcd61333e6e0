//! User settings for hostvault
//!
//! Manages the backup source set, the sync policy split used during restore,
//! and disk-space thresholds.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::error::HostVaultError;

/// User settings for hostvault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Location of the restic repository
    #[serde(default = "default_repository")]
    pub repository: PathBuf,

    /// Base directory under which restore staging directories are created
    #[serde(default = "default_staging_base")]
    pub staging_base: PathBuf,

    /// Paths included in a backup
    #[serde(default = "default_backup_paths")]
    pub backup_paths: Vec<PathBuf>,

    /// Paths excluded from backups and from the estimator scan.
    /// Must stay identical to the exclusion set passed to the store, or the
    /// first-backup estimate is meaningless.
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<PathBuf>,

    /// Top-level roots restored with the mirror policy (deletions propagate)
    #[serde(default = "default_mirror_paths")]
    pub mirror_paths: Vec<PathBuf>,

    /// Top-level roots restored with the additive policy (never delete)
    #[serde(default = "default_additive_paths")]
    pub additive_paths: Vec<PathBuf>,

    /// Paths neither sync policy may touch during restore
    #[serde(default = "default_sync_exclusions")]
    pub sync_exclusions: Vec<PathBuf>,

    /// The container runtime's on-disk data directory, swapped wholesale
    /// during restore
    #[serde(default = "default_runtime_data_dir")]
    pub runtime_data_dir: PathBuf,

    /// Free-space floor required before an incremental backup
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,

    /// Extra tags applied to every snapshot
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_repository() -> PathBuf {
    PathBuf::from("/var/lib/hostvault/repo")
}

fn default_staging_base() -> PathBuf {
    PathBuf::from("/var/lib/hostvault/staging")
}

fn default_backup_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn default_exclude_paths() -> Vec<PathBuf> {
    [
        "/proc",
        "/sys",
        "/dev",
        "/run",
        "/tmp",
        "/mnt",
        "/media",
        "/lost+found",
        "/var/lib/hostvault",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_mirror_paths() -> Vec<PathBuf> {
    ["/home", "/root", "/etc", "/opt", "/srv", "/var"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

fn default_additive_paths() -> Vec<PathBuf> {
    ["/usr", "/bin", "/sbin", "/lib", "/lib64"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

fn default_sync_exclusions() -> Vec<PathBuf> {
    [
        "/proc",
        "/sys",
        "/dev",
        "/run",
        "/tmp",
        "/boot/efi",
        "/var/lib/hostvault",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_runtime_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/docker")
}

fn default_min_free_bytes() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            repository: default_repository(),
            staging_base: default_staging_base(),
            backup_paths: default_backup_paths(),
            exclude_paths: default_exclude_paths(),
            mirror_paths: default_mirror_paths(),
            additive_paths: default_additive_paths(),
            sync_exclusions: default_sync_exclusions(),
            runtime_data_dir: default_runtime_data_dir(),
            min_free_bytes: default_min_free_bytes(),
            tags: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &VaultPaths) -> Result<Self, HostVaultError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| HostVaultError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                HostVaultError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Create default settings
            let settings = Settings::default();
            // Don't save yet - let caller decide when to persist
            Ok(settings)
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> Result<(), HostVaultError> {
        // Ensure the config directory exists
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| HostVaultError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(&settings_path, contents)
            .map_err(|e| HostVaultError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.backup_paths, vec![PathBuf::from("/")]);
        assert!(settings.exclude_paths.contains(&PathBuf::from("/proc")));
        assert!(settings
            .sync_exclusions
            .contains(&PathBuf::from("/boot/efi")));
        assert_eq!(settings.runtime_data_dir, PathBuf::from("/var/lib/docker"));
        assert_eq!(settings.min_free_bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.min_free_bytes = 512;
        settings.tags = vec!["weekly".to_string()];

        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.min_free_bytes, 512);
        assert_eq!(loaded.tags, vec!["weekly".to_string()]);
    }

    #[test]
    fn test_serde_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let deserialized: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings.repository, deserialized.repository);
        assert_eq!(settings.mirror_paths, deserialized.mirror_paths);
    }
}
