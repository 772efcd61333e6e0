//! File synchronization layer
//!
//! Wraps rsync behind the [`FileSync`] trait. Two policies exist: mirror
//! (deletions on the destination propagate from the source) and additive
//! (never delete). The restore orchestrator picks the policy per top-level
//! root.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{HostVaultError, HostVaultResult};

/// File tree synchronization between a staged source and the live system
pub trait FileSync {
    /// Make `dest` exactly match `source`, deleting destination files the
    /// source lacks. Paths in `excludes` are never touched.
    fn mirror(&self, source: &Path, dest: &Path, excludes: &[PathBuf]) -> HostVaultResult<()>;

    /// Copy `source` into `dest` without ever deleting destination files
    fn additive(&self, source: &Path, dest: &Path) -> HostVaultResult<()>;
}

/// File sync implementation backed by the rsync binary
#[derive(Debug, Clone, Default)]
pub struct RsyncSync;

impl RsyncSync {
    pub fn new() -> Self {
        Self
    }

    /// Whether the rsync binary is available on this host
    pub fn is_installed() -> bool {
        which::which("rsync").is_ok()
    }

    fn run(&self, args: &[String]) -> HostVaultResult<()> {
        debug!("rsync {}", args.join(" "));

        let output = Command::new("rsync")
            .args(args)
            .output()
            .map_err(|e| HostVaultError::Sync(format!("Failed to run rsync: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostVaultError::Sync(format!(
                "rsync failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl FileSync for RsyncSync {
    fn mirror(&self, source: &Path, dest: &Path, excludes: &[PathBuf]) -> HostVaultResult<()> {
        self.run(&mirror_args(source, dest, excludes))
    }

    fn additive(&self, source: &Path, dest: &Path) -> HostVaultResult<()> {
        self.run(&additive_args(source, dest))
    }
}

/// Archive mode with ACLs, xattrs and hardlinks, plus the trailing slash
/// that merges the source's contents into dest
fn base_args(source: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-aAXH".to_string(),
        "--numeric-ids".to_string(),
        format!("{}/", source.display()),
        dest.display().to_string(),
    ]
}

fn mirror_args(source: &Path, dest: &Path, excludes: &[PathBuf]) -> Vec<String> {
    let mut args = base_args(source, dest);
    args.insert(1, "--delete".to_string());
    for exclude in excludes {
        args.insert(1, format!("--exclude={}", exclude.display()));
    }
    args
}

fn additive_args(source: &Path, dest: &Path) -> Vec<String> {
    base_args(source, dest)
}
