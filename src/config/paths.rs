//! Path management for hostvault
//!
//! Resolves the locations of the configuration file, the repository
//! credential, and the restore staging area.
//!
//! ## Path Resolution Order
//!
//! 1. `HOSTVAULT_CONFIG_DIR` environment variable (if set)
//! 2. `/etc/hostvault` (the tool runs as root)

use std::path::PathBuf;

use crate::error::HostVaultError;

/// Manages all paths used by hostvault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    /// Base directory for configuration and the credential file
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Create a new VaultPaths instance
    ///
    /// Path resolution:
    /// 1. `HOSTVAULT_CONFIG_DIR` env var (explicit override)
    /// 2. `/etc/hostvault`
    pub fn new() -> Result<Self, HostVaultError> {
        let base_dir = if let Ok(custom) = std::env::var("HOSTVAULT_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            PathBuf::from("/etc/hostvault")
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (/etc/hostvault or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the repository credential file
    ///
    /// The file is created with owner-only permissions and its contents are
    /// never logged.
    pub fn credential_file(&self) -> PathBuf {
        self.base_dir.join("repo.key")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), HostVaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| HostVaultError::Io(format!("Failed to create config directory: {}", e)))?;

        Ok(())
    }

    /// Check if hostvault has been initialized (credential file exists)
    pub fn is_initialized(&self) -> bool {
        self.credential_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.credential_file(), temp_dir.path().join("repo.key"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("nested").join("hostvault");
        let paths = VaultPaths::with_base_dir(base.clone());

        paths.ensure_directories().unwrap();

        assert!(base.exists());
    }

    #[test]
    fn test_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert!(!paths.is_initialized());
        std::fs::write(paths.credential_file(), "secret").unwrap();
        assert!(paths.is_initialized());
    }
}
