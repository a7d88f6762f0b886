//! Mount lifecycle management
//!
//! One `MountManager` owns the registry of live mounts and drives the whole
//! lifecycle: spawning and verifying the helper, tearing mounts down, and
//! sweeping the registry against actual OS process state.
//!
//! Concurrency model: a single coarse read/write lock over the registry.
//! `mount` and `unmount` hold the write lock for their entire duration,
//! including the stabilization wait, so concurrent calls serialize and a path
//! can never be mounted twice. Status queries take the read lock and re-probe
//! process liveness on every call instead of trusting a stored flag. The
//! sweeper shares the write lock and is the only self-healing path for
//! registry drift caused by external process death.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::MountOptions;
use crate::error::{MountError, Result};
use crate::helper::MountHelper;
use crate::path::{canonicalize_target, is_drive_target};
use crate::process;
use crate::profile::{ProfileStore, RemoteCredentials};

/// How long a freshly spawned helper must stay alive before the mount counts
const STABILIZATION_WAIT: Duration = Duration::from_secs(3);

/// How often the sweeper reconciles the registry against process state
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// A verified live mount.
///
/// Immutable once created; a remount replaces the record wholesale. Created
/// only after the spawned helper survived the stabilization window.
#[derive(Debug, Clone)]
pub struct MountRecord {
    /// Helper process id
    pub pid: u32,
    /// Canonical mount path, the registry key
    pub path: PathBuf,
    /// Logical remote name
    pub remote: String,
    /// When the helper was spawned
    pub started_at: SystemTime,
    /// Snapshot of the options the helper was started with
    pub options: MountOptions,
}

/// Point-in-time mount state, derived and never stored
#[derive(Debug, Clone, Serialize)]
pub struct MountStatus {
    pub mounted: bool,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MountStatus {
    fn live(record: &MountRecord) -> Self {
        Self {
            mounted: true,
            path: record.path.clone(),
            pid: Some(record.pid),
            error: None,
        }
    }

    fn gone(path: PathBuf, pid: Option<u32>) -> Self {
        Self {
            mounted: false,
            path,
            pid,
            error: None,
        }
    }

    fn dead(record: &MountRecord) -> Self {
        Self {
            mounted: false,
            path: record.path.clone(),
            pid: Some(record.pid),
            error: Some(format!("helper process {} is no longer running", record.pid)),
        }
    }
}

/// Everything needed to attach one remote to one target path
#[derive(Debug, Clone)]
pub struct MountRequest {
    /// Mount target as given by the caller (drive letter or directory path)
    pub target: String,
    /// Remote credentials for the profile store
    pub credentials: RemoteCredentials,
    /// Pass-through helper options
    pub options: MountOptions,
}

/// Mount lifecycle manager: registry, supervision, teardown, sweeping
pub struct MountManager {
    helper: Arc<dyn MountHelper>,
    profiles: ProfileStore,
    registry: RwLock<HashMap<PathBuf, MountRecord>>,
    stabilization: Duration,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MountManager {
    /// Create a manager with the default stabilization wait and sweep period
    pub fn new(helper: Arc<dyn MountHelper>, profiles: ProfileStore) -> Self {
        Self {
            helper,
            profiles,
            registry: RwLock::new(HashMap::new()),
            stabilization: STABILIZATION_WAIT,
            sweep_interval: SWEEP_INTERVAL,
            sweeper: Mutex::new(None),
        }
    }

    /// Override the stabilization wait and sweep period
    pub fn with_timing(mut self, stabilization: Duration, sweep_interval: Duration) -> Self {
        self.stabilization = stabilization;
        self.sweep_interval = sweep_interval;
        self
    }

    /// Attach a remote at the requested target path.
    ///
    /// Idempotent per canonical path: if a live mount already exists there its
    /// current status is returned and nothing is spawned. The write lock is
    /// held for the whole operation, stabilization wait included.
    pub async fn mount(&self, request: MountRequest) -> Result<MountStatus> {
        if request.credentials.remote_name.trim().is_empty() {
            return Err(MountError::Validation(
                "remote name must not be empty".to_string(),
            ));
        }
        let canonical = canonicalize_target(&request.target)?;

        let mut registry = self.registry.write().await;

        if let Some(existing) = registry.get(&canonical) {
            if process::is_alive(existing.pid) {
                info!(path = ?canonical, pid = existing.pid, "Mount already active");
                return Ok(MountStatus::live(existing));
            }
            debug!(path = ?canonical, pid = existing.pid, "Replacing dead mount record");
            registry.remove(&canonical);
        }

        // Drive-letter targets must not have a pre-existing folder; the OS
        // materializes the drive itself.
        if skip_directory_creation(&request.target) {
            debug!(target = %request.target, "Drive-letter target, skipping directory creation");
        } else if !canonical.exists() {
            create_mount_dir(&canonical)?;
        }

        let version = self.helper.probe_version().await?;
        debug!(%version, "Mount helper available");

        self.profiles
            .ensure(&request.credentials, self.helper.as_ref())
            .await?;

        let args = self.helper.mount_args(
            &request.credentials.remote_name,
            &canonical,
            &request.options,
            self.profiles.path(),
        );
        let mut child = self.helper.spawn_mount(args)?;
        let pid = child.id().ok_or_else(|| {
            MountError::Spawn("helper exited before a pid could be read".to_string())
        })?;

        // The helper either settles in or dies fast; wait out the window and
        // check once.
        tokio::time::sleep(self.stabilization).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                let detail = early_exit_detail(&mut child, &status.to_string()).await;
                return Err(MountError::EarlyExit(detail));
            }
            Err(e) => {
                return Err(MountError::Spawn(format!("failed to poll helper: {}", e)));
            }
        }
        // Detached from here on; liveness is tracked by pid probes.
        drop(child);

        let record = MountRecord {
            pid,
            path: canonical.clone(),
            remote: request.credentials.remote_name.clone(),
            started_at: SystemTime::now(),
            options: request.options,
        };
        info!(path = ?canonical, pid, remote = %record.remote, "Mounted");

        let status = MountStatus::live(&record);
        registry.insert(canonical, record);
        Ok(status)
    }

    /// Detach the mount at `target` and drop it from the registry.
    ///
    /// The record is removed regardless of how teardown goes: the registry
    /// reflects intent, and the sweeper reconciles any process that survives.
    /// A forced-termination failure is still reported to the caller.
    pub async fn unmount(&self, target: &str) -> Result<MountStatus> {
        let canonical = canonicalize_target(target)?;
        let mut registry = self.registry.write().await;

        // Canonical first, raw spelling as a fallback for legacy callers.
        let record = registry
            .remove(&canonical)
            .or_else(|| registry.remove(Path::new(target)))
            .ok_or_else(|| MountError::NotMounted(canonical.clone()))?;

        if process::is_alive(record.pid) {
            if process::detach_mount(&record.path) {
                debug!(path = ?record.path, "Mount released via OS unmount");
            }
            if process::is_alive(record.pid) {
                if let Err(e) = process::terminate(record.pid) {
                    warn!(path = ?record.path, pid = record.pid, "Forced termination failed: {}", e);
                    return Err(MountError::Teardown(format!(
                        "pid {}: {}",
                        record.pid, e
                    )));
                }
            }
        }

        info!(path = ?record.path, pid = record.pid, "Unmounted");
        Ok(MountStatus::gone(record.path, Some(record.pid)))
    }

    /// Unmount every tracked path; teardown failures are logged, not returned
    pub async fn unmount_all(&self) {
        let targets: Vec<String> = self
            .registry
            .read()
            .await
            .keys()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        for target in targets {
            if let Err(e) = self.unmount(&target).await {
                warn!(target = %target, "Unmount during shutdown failed: {}", e);
            }
        }
    }

    /// Current state of one path, re-validated against live process state
    pub async fn status(&self, target: &str) -> Result<MountStatus> {
        let canonical = canonicalize_target(target)?;
        let registry = self.registry.read().await;

        let record = registry
            .get(&canonical)
            .or_else(|| registry.get(Path::new(target)));
        Ok(match record {
            Some(record) if process::is_alive(record.pid) => MountStatus::live(record),
            Some(record) => MountStatus::dead(record),
            None => MountStatus::gone(canonical, None),
        })
    }

    /// Current state of every tracked mount, each re-probed at call time
    pub async fn statuses(&self) -> Vec<MountStatus> {
        let registry = self.registry.read().await;
        registry
            .values()
            .map(|record| {
                if process::is_alive(record.pid) {
                    MountStatus::live(record)
                } else {
                    MountStatus::dead(record)
                }
            })
            .collect()
    }

    /// Number of tracked mounts (dead-but-unswept entries included)
    pub async fn count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Drop every record whose process is gone. Returns how many were purged.
    pub async fn sweep(&self) -> usize {
        let mut registry = self.registry.write().await;
        let before = registry.len();
        registry.retain(|path, record| {
            let alive = process::is_alive(record.pid);
            if !alive {
                info!(path = ?path, pid = record.pid, "Purging dead mount record");
            }
            alive
        });
        before - registry.len()
    }

    /// Start the background health sweeper. Replaces a previous sweeper task.
    pub fn start_sweeper(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let period = self.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the first sweep should wait a period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = manager.sweep().await;
                if purged > 0 {
                    debug!(purged, "Health sweep removed dead mounts");
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background health sweeper
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for MountManager {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

/// Drive-letter targets only exist on Windows. A bare `"m"` on POSIX is an
/// ordinary relative directory target and still gets its mount point created.
fn skip_directory_creation(target: &str) -> bool {
    cfg!(windows) && is_drive_target(target)
}

/// Create the mount target directory (0755 on POSIX)
fn create_mount_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(path)?;
    Ok(())
}

/// Compose the early-exit diagnostic from the helper's exit status and the
/// tail of its stderr. The most common cause is a missing filesystem driver.
async fn early_exit_detail(child: &mut tokio::process::Child, status: &str) -> String {
    let mut captured = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut captured).await;
    }

    let tail: Vec<&str> = captured.trim().lines().rev().take(3).collect();
    let hint = "is the FUSE/WinFsp filesystem driver installed?";
    if tail.is_empty() {
        format!("{} ({})", status, hint)
    } else {
        let lines: Vec<&str> = tail.into_iter().rev().collect();
        format!("{}: {} ({})", status, lines.join(" | "), hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_posix_targets_always_get_a_mount_directory() {
        // A bare letter is a relative directory name here, not a drive.
        assert!(!skip_directory_creation("m"));
        assert!(!skip_directory_creation("D:"));
        assert!(!skip_directory_creation("/mnt/remote"));
    }

    #[cfg(windows)]
    #[test]
    fn test_drive_letter_targets_skip_directory_creation() {
        assert!(skip_directory_creation("D"));
        assert!(skip_directory_creation("d:"));
        assert!(!skip_directory_creation("D:\\media"));
    }
}
