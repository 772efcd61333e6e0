//! Repository initialization command
//!
//! Creates the credential file with owner-only permissions and initializes
//! the snapshot repository. The credential value is never echoed, logged,
//! or printed.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use crate::config::paths::VaultPaths;
use crate::config::settings::Settings;
use crate::error::{HostVaultError, HostVaultResult};
use crate::store::SnapshotStore;

/// Handle the init command
pub fn handle_init_command<S: SnapshotStore>(
    paths: &VaultPaths,
    settings: &Settings,
    store: &S,
    force: bool,
) -> HostVaultResult<()> {
    let credential_file = paths.credential_file();

    if credential_file.exists() && !force {
        println!("A repository credential already exists at:");
        println!("  {}", credential_file.display());
        println!("Re-run with --force to overwrite it.");
        return Ok(());
    }

    paths.ensure_directories()?;

    let password = rpassword::prompt_password("Repository password: ")
        .map_err(|e| HostVaultError::Io(format!("Failed to read password: {}", e)))?;
    let confirmation = rpassword::prompt_password("Confirm password: ")
        .map_err(|e| HostVaultError::Io(format!("Failed to read password: {}", e)))?;

    if password != confirmation {
        return Err(HostVaultError::Aborted("passwords do not match".into()));
    }
    if password.is_empty() {
        return Err(HostVaultError::Aborted("password must not be empty".into()));
    }

    write_credential(&credential_file, &password)?;

    if let Some(parent) = settings.repository.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| HostVaultError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
    }

    store.init()?;
    settings.save(paths)?;

    println!("Repository initialized at: {}", settings.repository.display());
    println!("Credential stored at:     {}", credential_file.display());

    Ok(())
}

/// Write the credential with owner-only read/write permission
fn write_credential(path: &std::path::Path, password: &str) -> HostVaultResult<()> {
    fs::write(path, password)
        .map_err(|e| HostVaultError::Io(format!("Failed to write credential file: {}", e)))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| HostVaultError::Io(format!("Failed to set credential permissions: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_credential_is_owner_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repo.key");

        write_credential(&path, "hunter2").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hunter2");
    }
}
