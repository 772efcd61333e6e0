//! Workload topology capture and replay
//!
//! Records which containers are running before a destructive operation and
//! replays the same topology afterwards. Captured state lives only for the
//! duration of one backup or restore.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use log::{debug, warn};

use super::{ContainerRuntime, COMPOSE_PROJECT_LABEL, COMPOSE_WORKDIR_LABEL};
use crate::error::HostVaultResult;

/// How much of the runtime a capture takes down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureScope {
    /// Stop only the enumerated containers; the daemon stays up (backup)
    ContainersOnly,
    /// Stop the whole runtime daemon; its data directory is about to be
    /// replaced (restore)
    FullRuntime,
}

/// Point-in-time record of the running workload topology
#[derive(Debug, Clone)]
pub struct WorkloadState {
    /// Names of containers not managed by a compose project
    pub standalone: Vec<String>,
    /// Compose project name mapped to the working directory used to
    /// redeploy it; one entry per project
    pub composed: BTreeMap<String, PathBuf>,
    /// Whether the runtime was active when the capture ran
    pub was_running: bool,
    scope: CaptureScope,
}

impl WorkloadState {
    /// An inert state for hosts without an active runtime
    fn inactive(scope: CaptureScope) -> Self {
        Self {
            standalone: Vec::new(),
            composed: BTreeMap::new(),
            was_running: false,
            scope,
        }
    }

    /// Capture the running workload topology and stop it according to
    /// `scope`.
    ///
    /// A host without an installed or active runtime yields an inert state
    /// (`was_running == false`) and touches nothing.
    pub fn capture<R: ContainerRuntime>(runtime: &R, scope: CaptureScope) -> HostVaultResult<Self> {
        if !runtime.is_installed() || !runtime.is_active() {
            debug!("Container runtime not active; nothing to capture");
            return Ok(Self::inactive(scope));
        }

        let ids = runtime.running_ids()?;

        let mut standalone = Vec::new();
        let mut composed = BTreeMap::new();
        let mut seen_projects = HashSet::new();

        for id in &ids {
            let info = runtime.inspect(id)?;

            match info.labels.get(COMPOSE_PROJECT_LABEL) {
                Some(project) => {
                    seen_projects.insert(project.clone());
                    if composed.contains_key(project) {
                        continue;
                    }
                    match info
                        .labels
                        .get(COMPOSE_WORKDIR_LABEL)
                        .filter(|dir| !dir.is_empty())
                    {
                        Some(dir) => {
                            composed.insert(project.clone(), PathBuf::from(dir));
                        }
                        None => {
                            // Another container of the same project may still
                            // carry the working directory.
                        }
                    }
                }
                None => standalone.push(info.name),
            }
        }

        for project in &seen_projects {
            if !composed.contains_key(project) {
                warn!(
                    "Compose project '{}' has no working directory label; it will not be restarted",
                    project
                );
            }
        }

        match scope {
            CaptureScope::ContainersOnly => runtime.stop_containers(&ids)?,
            CaptureScope::FullRuntime => runtime.stop_daemon()?,
        }

        Ok(Self {
            standalone,
            composed,
            was_running: true,
            scope,
        })
    }

    /// Replay the captured topology.
    ///
    /// Restarts the daemon first when the capture stopped it, then the
    /// standalone containers in one batch, then each compose project from
    /// its working directory. Safe no-op when nothing was running.
    pub fn resume<R: ContainerRuntime>(&self, runtime: &R) -> HostVaultResult<()> {
        if !self.was_running {
            return Ok(());
        }

        if self.scope == CaptureScope::FullRuntime {
            runtime.start_daemon()?;
        }

        runtime.start_containers(&self.standalone)?;

        for (project, dir) in &self.composed {
            if !dir.exists() {
                warn!(
                    "Working directory {} for project '{}' no longer exists; skipping",
                    dir.display(),
                    project
                );
                continue;
            }
            if let Err(e) = runtime.compose_up(dir) {
                warn!("Failed to bring up project '{}': {}", project, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostVaultResult;
    use crate::runtime::ContainerInfo;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Scripted runtime that records every call
    #[derive(Clone, Default)]
    struct FakeRuntime {
        installed: bool,
        active: bool,
        containers: Vec<(String, ContainerInfo)>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeRuntime {
        fn running(containers: Vec<(String, ContainerInfo)>) -> Self {
            Self {
                installed: true,
                active: true,
                containers,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn is_installed(&self) -> bool {
            self.installed
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn running_ids(&self) -> HostVaultResult<Vec<String>> {
            Ok(self.containers.iter().map(|(id, _)| id.clone()).collect())
        }

        fn inspect(&self, id: &str) -> HostVaultResult<ContainerInfo> {
            Ok(self
                .containers
                .iter()
                .find(|(cid, _)| cid == id)
                .map(|(_, info)| info.clone())
                .unwrap_or_default())
        }

        fn stop_containers(&self, ids: &[String]) -> HostVaultResult<()> {
            self.log(format!("stop_containers:{}", ids.join(",")));
            Ok(())
        }

        fn start_containers(&self, names: &[String]) -> HostVaultResult<()> {
            if !names.is_empty() {
                self.log(format!("start_containers:{}", names.join(",")));
            }
            Ok(())
        }

        fn stop_daemon(&self) -> HostVaultResult<()> {
            self.log("stop_daemon");
            Ok(())
        }

        fn start_daemon(&self) -> HostVaultResult<()> {
            self.log("start_daemon");
            Ok(())
        }

        fn compose_up(&self, working_dir: &Path) -> HostVaultResult<()> {
            self.log(format!("compose_up:{}", working_dir.display()));
            Ok(())
        }
    }

    fn composed_info(name: &str, project: &str, workdir: Option<&str>) -> ContainerInfo {
        let mut labels = HashMap::new();
        labels.insert(COMPOSE_PROJECT_LABEL.to_string(), project.to_string());
        if let Some(dir) = workdir {
            labels.insert(COMPOSE_WORKDIR_LABEL.to_string(), dir.to_string());
        }
        ContainerInfo {
            name: name.to_string(),
            labels,
        }
    }

    fn standalone_info(name: &str) -> ContainerInfo {
        ContainerInfo {
            name: name.to_string(),
            labels: HashMap::new(),
        }
    }

    #[test]
    fn test_capture_noop_when_runtime_inactive() {
        let runtime = FakeRuntime {
            installed: true,
            active: false,
            ..Default::default()
        };

        let state = WorkloadState::capture(&runtime, CaptureScope::FullRuntime).unwrap();

        assert!(!state.was_running);
        assert!(state.standalone.is_empty());
        assert!(state.composed.is_empty());
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_capture_classifies_and_stops_containers_for_backup() {
        let runtime = FakeRuntime::running(vec![
            ("aaa".into(), standalone_info("redis-cache")),
            (
                "bbb".into(),
                composed_info("paperless-web-1", "paperless", Some("/opt/paperless")),
            ),
        ]);

        let state = WorkloadState::capture(&runtime, CaptureScope::ContainersOnly).unwrap();

        assert!(state.was_running);
        assert_eq!(state.standalone, vec!["redis-cache".to_string()]);
        assert_eq!(
            state.composed.get("paperless"),
            Some(&PathBuf::from("/opt/paperless"))
        );
        assert_eq!(runtime.calls(), vec!["stop_containers:aaa,bbb".to_string()]);
    }

    #[test]
    fn test_capture_stops_daemon_for_restore() {
        let runtime = FakeRuntime::running(vec![("aaa".into(), standalone_info("redis-cache"))]);

        let state = WorkloadState::capture(&runtime, CaptureScope::FullRuntime).unwrap();

        assert!(state.was_running);
        assert_eq!(runtime.calls(), vec!["stop_daemon".to_string()]);
    }

    #[test]
    fn test_capture_dedups_composed_group() {
        let runtime = FakeRuntime::running(vec![
            (
                "bbb".into(),
                composed_info("paperless-web-1", "paperless", Some("/opt/paperless")),
            ),
            (
                "ccc".into(),
                composed_info("paperless-db-1", "paperless", None),
            ),
        ]);

        let state = WorkloadState::capture(&runtime, CaptureScope::ContainersOnly).unwrap();

        assert_eq!(state.composed.len(), 1);
        assert_eq!(
            state.composed.get("paperless"),
            Some(&PathBuf::from("/opt/paperless"))
        );
    }

    #[test]
    fn test_capture_takes_workdir_from_later_container() {
        let runtime = FakeRuntime::running(vec![
            (
                "bbb".into(),
                composed_info("paperless-db-1", "paperless", None),
            ),
            (
                "ccc".into(),
                composed_info("paperless-web-1", "paperless", Some("/opt/paperless")),
            ),
        ]);

        let state = WorkloadState::capture(&runtime, CaptureScope::ContainersOnly).unwrap();

        assert_eq!(
            state.composed.get("paperless"),
            Some(&PathBuf::from("/opt/paperless"))
        );
    }

    #[test]
    fn test_capture_drops_group_without_workdir() {
        let runtime = FakeRuntime::running(vec![(
            "bbb".into(),
            composed_info("orphan-app-1", "orphan", None),
        )]);

        let state = WorkloadState::capture(&runtime, CaptureScope::ContainersOnly).unwrap();

        assert!(state.composed.is_empty());
    }

    #[test]
    fn test_resume_noop_when_nothing_was_running() {
        let runtime = FakeRuntime::running(vec![]);
        let state = WorkloadState::inactive(CaptureScope::FullRuntime);

        state.resume(&runtime).unwrap();

        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_resume_order_daemon_then_containers_then_groups() {
        let workdir = TempDir::new().unwrap();
        let runtime = FakeRuntime::running(vec![]);

        let mut composed = BTreeMap::new();
        composed.insert("paperless".to_string(), workdir.path().to_path_buf());
        let state = WorkloadState {
            standalone: vec!["redis-cache".to_string()],
            composed,
            was_running: true,
            scope: CaptureScope::FullRuntime,
        };

        state.resume(&runtime).unwrap();

        assert_eq!(
            runtime.calls(),
            vec![
                "start_daemon".to_string(),
                "start_containers:redis-cache".to_string(),
                format!("compose_up:{}", workdir.path().display()),
            ]
        );
    }

    #[test]
    fn test_resume_skips_missing_workdir() {
        let runtime = FakeRuntime::running(vec![]);

        let mut composed = BTreeMap::new();
        composed.insert(
            "gone".to_string(),
            PathBuf::from("/nonexistent/hostvault-test-dir"),
        );
        let state = WorkloadState {
            standalone: Vec::new(),
            composed,
            was_running: true,
            scope: CaptureScope::ContainersOnly,
        };

        state.resume(&runtime).unwrap();

        assert!(runtime
            .calls()
            .iter()
            .all(|c| !c.starts_with("compose_up")));
    }
}
