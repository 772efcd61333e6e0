//! Docker-backed container runtime
//!
//! Shells out to the docker and systemctl binaries. Compose capability is
//! probed once at construction and reused for every group-up call.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;
use serde_json::Value;

use super::{ContainerInfo, ContainerRuntime};
use crate::error::{HostVaultError, HostVaultResult};

/// How compose projects are brought up on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// `docker compose` plugin
    Plugin,
    /// Standalone `docker-compose` binary
    Standalone,
    /// Neither variant is available
    Unavailable,
}

/// Container runtime implementation backed by the Docker CLI
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    compose: ComposeCommand,
}

impl DockerRuntime {
    /// Probe the host once and build a runtime client with a resolved
    /// compose strategy
    pub fn detect() -> Self {
        Self {
            compose: detect_compose(),
        }
    }

    /// Build a runtime client with an explicit compose strategy
    pub fn with_compose(compose: ComposeCommand) -> Self {
        Self { compose }
    }

    /// The compose strategy resolved at construction
    pub fn compose(&self) -> ComposeCommand {
        self.compose
    }

    fn run_docker(&self, args: &[&str]) -> HostVaultResult<String> {
        debug!("docker {}", args.join(" "));

        let output = Command::new("docker")
            .args(args)
            .output()
            .map_err(|e| HostVaultError::Runtime(format!("Failed to run docker: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostVaultError::Runtime(format!(
                "docker {} failed: {}",
                args.first().unwrap_or(&"?"),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_systemctl(&self, args: &[&str]) -> HostVaultResult<()> {
        debug!("systemctl {}", args.join(" "));

        let output = Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|e| HostVaultError::Runtime(format!("Failed to run systemctl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostVaultError::Runtime(format!(
                "systemctl {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl ContainerRuntime for DockerRuntime {
    fn is_installed(&self) -> bool {
        which::which("docker").is_ok()
    }

    fn is_active(&self) -> bool {
        // Talk to the daemon rather than checking binary presence; a
        // stopped daemon must report inactive.
        Command::new("docker")
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn running_ids(&self) -> HostVaultResult<Vec<String>> {
        let stdout = self.run_docker(&["ps", "--quiet"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn inspect(&self, id: &str) -> HostVaultResult<ContainerInfo> {
        let stdout = self.run_docker(&["inspect", id])?;
        parse_inspect(&stdout)
    }

    fn stop_containers(&self, ids: &[String]) -> HostVaultResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut args = vec!["stop"];
        args.extend(ids.iter().map(String::as_str));
        self.run_docker(&args)?;
        Ok(())
    }

    fn start_containers(&self, names: &[String]) -> HostVaultResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["start"];
        args.extend(names.iter().map(String::as_str));
        self.run_docker(&args)?;
        Ok(())
    }

    fn stop_daemon(&self) -> HostVaultResult<()> {
        // The socket unit would re-activate the daemon on the next client
        // connection, so it goes down with the service.
        self.run_systemctl(&["stop", "docker.socket", "docker"])
    }

    fn start_daemon(&self) -> HostVaultResult<()> {
        self.run_systemctl(&["start", "docker"])
    }

    fn compose_up(&self, working_dir: &Path) -> HostVaultResult<()> {
        let mut cmd = match self.compose {
            ComposeCommand::Plugin => {
                let mut c = Command::new("docker");
                c.args(["compose", "up", "-d"]);
                c
            }
            ComposeCommand::Standalone => {
                let mut c = Command::new("docker-compose");
                c.args(["up", "-d"]);
                c
            }
            ComposeCommand::Unavailable => {
                return Err(HostVaultError::Runtime(
                    "No compose capability detected on this host".into(),
                ));
            }
        };

        debug!("compose up -d in {}", working_dir.display());

        let output = cmd
            .current_dir(working_dir)
            .output()
            .map_err(|e| HostVaultError::Runtime(format!("Failed to run compose: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostVaultError::Runtime(format!(
                "compose up in {} failed: {}",
                working_dir.display(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Resolve which compose variant this host carries, if any
fn detect_compose() -> ComposeCommand {
    let plugin_works = Command::new("docker")
        .args(["compose", "version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if plugin_works {
        ComposeCommand::Plugin
    } else if which::which("docker-compose").is_ok() {
        ComposeCommand::Standalone
    } else {
        ComposeCommand::Unavailable
    }
}

/// Parse the name and labels out of a `docker inspect` JSON document
fn parse_inspect(stdout: &str) -> HostVaultResult<ContainerInfo> {
    let parsed: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| HostVaultError::Runtime(format!("Failed to parse inspect output: {}", e)))?;

    let entry = parsed
        .get(0)
        .ok_or_else(|| HostVaultError::Runtime("Empty inspect output".into()))?;

    let name = entry["Name"]
        .as_str()
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string();

    let mut labels = HashMap::new();
    if let Some(map) = entry["Config"]["Labels"].as_object() {
        for (key, value) in map {
            if let Some(v) = value.as_str() {
                labels.insert(key.clone(), v.to_string());
            }
        }
    }

    Ok(ContainerInfo { name, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{COMPOSE_PROJECT_LABEL, COMPOSE_WORKDIR_LABEL};

    const INSPECT: &str = r#"[
        {
            "Id": "3d4f9a",
            "Name": "/paperless-web-1",
            "Config": {
                "Labels": {
                    "com.docker.compose.project": "paperless",
                    "com.docker.compose.project.working_dir": "/opt/paperless"
                }
            }
        }
    ]"#;

    #[test]
    fn test_parse_inspect_strips_leading_slash() {
        let info = parse_inspect(INSPECT).unwrap();
        assert_eq!(info.name, "paperless-web-1");
    }

    #[test]
    fn test_parse_inspect_labels() {
        let info = parse_inspect(INSPECT).unwrap();
        assert_eq!(
            info.labels.get(COMPOSE_PROJECT_LABEL).map(String::as_str),
            Some("paperless")
        );
        assert_eq!(
            info.labels.get(COMPOSE_WORKDIR_LABEL).map(String::as_str),
            Some("/opt/paperless")
        );
    }

    #[test]
    fn test_parse_inspect_null_labels() {
        let stdout = r#"[{"Name": "/standalone-db", "Config": {"Labels": null}}]"#;
        let info = parse_inspect(stdout).unwrap();
        assert_eq!(info.name, "standalone-db");
        assert!(info.labels.is_empty());
    }

    #[test]
    fn test_parse_inspect_empty() {
        assert!(parse_inspect("[]").is_err());
    }
}
