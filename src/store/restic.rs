//! restic-backed snapshot store
//!
//! Shells out to the restic binary. The repository location and password
//! file are passed through the environment; the credential never appears in
//! argument lists or log output.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use serde_json::Value;

use super::{BackupSummary, ContentEntry, Snapshot, SnapshotStore};
use crate::error::{HostVaultError, HostVaultResult};

/// How much stderr to keep when a restic call fails
const STDERR_TAIL: usize = 4096;

/// Snapshot store implementation backed by the restic binary
#[derive(Debug, Clone)]
pub struct ResticStore {
    repository: PathBuf,
    credential_file: PathBuf,
}

impl ResticStore {
    /// Create a store client for `repository`, authenticated via
    /// `credential_file`
    pub fn new(repository: PathBuf, credential_file: PathBuf) -> Self {
        Self {
            repository,
            credential_file,
        }
    }

    /// Whether the restic binary is available on this host
    pub fn is_installed() -> bool {
        which::which("restic").is_ok()
    }

    fn run(&self, args: &[&str]) -> HostVaultResult<String> {
        debug!("restic {}", args.join(" "));

        let output = Command::new("restic")
            .args(args)
            .env("RESTIC_REPOSITORY", &self.repository)
            .env("RESTIC_PASSWORD_FILE", &self.credential_file)
            .output()
            .map_err(|e| HostVaultError::Store(format!("Failed to run restic: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostVaultError::Store(format!(
                "restic {} failed: {}",
                args.first().unwrap_or(&"?"),
                stderr_tail(&stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SnapshotStore for ResticStore {
    fn init(&self) -> HostVaultResult<()> {
        self.run(&["init"])?;
        info!("Initialized repository at {}", self.repository.display());
        Ok(())
    }

    fn backup(
        &self,
        paths: &[PathBuf],
        excludes: &[PathBuf],
        tags: &[String],
    ) -> HostVaultResult<BackupSummary> {
        let mut args: Vec<String> = vec!["backup".into(), "--json".into()];
        for exclude in excludes {
            args.push("--exclude".into());
            args.push(exclude.display().to_string());
        }
        for tag in tags {
            args.push("--tag".into());
            args.push(tag.clone());
        }
        for path in paths {
            args.push(path.display().to_string());
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(&arg_refs)?;
        parse_backup_summary(&stdout)
    }

    fn snapshots(&self) -> HostVaultResult<Vec<Snapshot>> {
        let stdout = self.run(&["snapshots", "--json"])?;
        let snapshots: Vec<Snapshot> = serde_json::from_str(stdout.trim())
            .map_err(|e| HostVaultError::Store(format!("Failed to parse snapshot list: {}", e)))?;
        Ok(snapshots)
    }

    fn restore(&self, snapshot_id: &str, target: &Path) -> HostVaultResult<()> {
        let target_str = target.display().to_string();
        self.run(&["restore", snapshot_id, "--target", &target_str])?;
        Ok(())
    }

    fn content_listing(&self, snapshot_id: &str) -> HostVaultResult<Vec<ContentEntry>> {
        let stdout = self.run(&["ls", "--long", "--json", snapshot_id])?;
        Ok(parse_content_listing(&stdout))
    }

    fn delete(&self, snapshot_id: &str) -> HostVaultResult<()> {
        self.run(&["forget", "--prune", snapshot_id])?;
        info!("Deleted snapshot {}", snapshot_id);
        Ok(())
    }
}

/// Extract the run summary from restic's line-delimited JSON backup output
fn parse_backup_summary(stdout: &str) -> HostVaultResult<BackupSummary> {
    for line in stdout.lines().rev() {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if value["message_type"] == "summary" {
            return Ok(BackupSummary {
                snapshot_id: value["snapshot_id"].as_str().unwrap_or_default().to_string(),
                files_new: value["files_new"].as_u64().unwrap_or(0),
                files_changed: value["files_changed"].as_u64().unwrap_or(0),
                total_bytes_processed: value["total_bytes_processed"].as_u64().unwrap_or(0),
                data_added: value["data_added"].as_u64().unwrap_or(0),
            });
        }
    }

    Err(HostVaultError::Store(
        "Backup produced no summary output".into(),
    ))
}

/// Collect the file entries from restic's line-delimited JSON `ls` output.
///
/// The stream interleaves a snapshot header and directory nodes with the
/// file nodes; only files carry sizes that count toward restore space.
fn parse_content_listing(stdout: &str) -> Vec<ContentEntry> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|value| value["type"] == "file")
        .filter_map(|value| {
            Some(ContentEntry {
                path: PathBuf::from(value["path"].as_str()?),
                size: value["size"].as_u64().unwrap_or(0),
            })
        })
        .collect()
}

/// Keep only the tail of a failed command's stderr
fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        trimmed.to_string()
    } else {
        format!("...{}", &trimmed[trimmed.len() - STDERR_TAIL..])
    }
}
