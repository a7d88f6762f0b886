//! Mount lifecycle integration tests
//!
//! Exercises the manager against a fake helper whose "mount" is a real child
//! process (`sleep`), so liveness probes, teardown, and sweeping run against
//! actual OS process state.

#![cfg(unix)]

use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use remote_mount::config::MountOptions;
use remote_mount::helper::MountHelper;
use remote_mount::manager::{MountManager, MountRequest};
use remote_mount::process;
use remote_mount::profile::{ProfileStore, RemoteCredentials};
use remote_mount::{MountError, Result};

/// What the fake helper does when asked to mount
#[derive(Clone, Copy)]
enum HelperBehavior {
    /// Spawn a long-lived child, like a healthy helper
    StayUp,
    /// Spawn a child that exits immediately, like a helper missing its driver
    DieFast,
    /// Fail the version probe, like a missing binary
    Unavailable,
}

struct FakeHelper {
    behavior: HelperBehavior,
    spawns: AtomicUsize,
}

impl FakeHelper {
    fn new(behavior: HelperBehavior) -> Self {
        Self {
            behavior,
            spawns: AtomicUsize::new(0),
        }
    }

    fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MountHelper for FakeHelper {
    async fn probe_version(&self) -> Result<String> {
        match self.behavior {
            HelperBehavior::Unavailable => Err(MountError::HelperUnavailable(
                "fake helper not installed".to_string(),
            )),
            _ => Ok("fake-helper v1.0".to_string()),
        }
    }

    async fn obscure(&self, secret: &str) -> Result<String> {
        Ok(format!("obscured:{}", secret))
    }

    fn mount_args(
        &self,
        remote: &str,
        target: &Path,
        _options: &MountOptions,
        _profile_path: &Path,
    ) -> Vec<OsString> {
        vec![remote.into(), target.as_os_str().to_os_string()]
    }

    fn spawn_mount(&self, _args: Vec<OsString>) -> Result<tokio::process::Child> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let mut command = match self.behavior {
            HelperBehavior::DieFast => tokio::process::Command::new("false"),
            _ => {
                let mut c = tokio::process::Command::new("sleep");
                c.arg("300");
                c
            }
        };
        command
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| MountError::Spawn(e.to_string()))
    }
}

struct Fixture {
    _dir: TempDir,
    helper: Arc<FakeHelper>,
    manager: Arc<MountManager>,
    target: String,
}

fn fixture(behavior: HelperBehavior) -> Fixture {
    let dir = TempDir::new().unwrap();
    let helper = Arc::new(FakeHelper::new(behavior));
    let profiles = ProfileStore::new(dir.path().join("rclone.conf"));
    let manager = Arc::new(
        MountManager::new(helper.clone(), profiles)
            .with_timing(Duration::from_millis(100), Duration::from_millis(200)),
    );
    let target = dir.path().join("mnt").to_string_lossy().into_owned();
    Fixture {
        _dir: dir,
        helper,
        manager,
        target,
    }
}

fn request(target: &str) -> MountRequest {
    MountRequest {
        target: target.to_string(),
        credentials: RemoteCredentials {
            remote_name: "debrid".to_string(),
            endpoint: "https://dav.example.com/webdav".to_string(),
            username: "media".to_string(),
            secret: "hunter2".to_string(),
        },
        options: MountOptions::default(),
    }
}

#[tokio::test]
async fn test_mount_then_status_reports_live_pid() {
    let f = fixture(HelperBehavior::StayUp);

    let mounted = f.manager.mount(request(&f.target)).await.unwrap();
    assert!(mounted.mounted);
    let pid = mounted.pid.unwrap();

    let status = f.manager.status(&f.target).await.unwrap();
    assert!(status.mounted);
    assert_eq!(status.pid, Some(pid));

    f.manager.unmount(&f.target).await.unwrap();
}

#[tokio::test]
async fn test_mount_is_idempotent_per_path() {
    let f = fixture(HelperBehavior::StayUp);

    let first = f.manager.mount(request(&f.target)).await.unwrap();
    let second = f.manager.mount(request(&f.target)).await.unwrap();

    assert_eq!(first.pid, second.pid);
    assert_eq!(f.helper.spawn_count(), 1);
    assert_eq!(f.manager.count().await, 1);

    f.manager.unmount(&f.target).await.unwrap();
}

#[tokio::test]
async fn test_unmount_removes_record_and_kills_helper() {
    let f = fixture(HelperBehavior::StayUp);

    let mounted = f.manager.mount(request(&f.target)).await.unwrap();
    let pid = mounted.pid.unwrap();

    let gone = f.manager.unmount(&f.target).await.unwrap();
    assert!(!gone.mounted);
    assert_eq!(gone.pid, Some(pid));

    assert!(!process::is_alive(pid));
    assert_eq!(f.manager.count().await, 0);

    let status = f.manager.status(&f.target).await.unwrap();
    assert!(!status.mounted);
    assert_eq!(status.pid, None);
}

#[tokio::test]
async fn test_external_death_visible_immediately_then_swept() {
    let f = fixture(HelperBehavior::StayUp);

    let mounted = f.manager.mount(request(&f.target)).await.unwrap();
    let pid = mounted.pid.unwrap();

    // Kill the helper behind the manager's back.
    process::terminate(pid).unwrap();

    // A direct status query must not trust the registry.
    let status = f.manager.status(&f.target).await.unwrap();
    assert!(!status.mounted);
    assert_eq!(status.pid, Some(pid));
    assert!(status.error.as_deref().unwrap_or("").contains("no longer running"));
    assert_eq!(f.manager.count().await, 1);

    let purged = f.manager.sweep().await;
    assert_eq!(purged, 1);
    assert!(f.manager.statuses().await.is_empty());
}

#[tokio::test]
async fn test_single_letter_relative_target_gets_mount_directory() {
    let f = fixture(HelperBehavior::StayUp);

    // Resolves against the scratch dir; "m" is an ordinary directory name on
    // POSIX, never a drive letter.
    std::env::set_current_dir(f._dir.path()).unwrap();

    let mounted = f.manager.mount(request("m")).await.unwrap();
    assert!(mounted.mounted);
    assert!(f._dir.path().join("m").is_dir());

    f.manager.unmount("m").await.unwrap();
}

#[tokio::test]
async fn test_unmount_of_dead_helper_still_removes_record() {
    let f = fixture(HelperBehavior::StayUp);

    let mounted = f.manager.mount(request(&f.target)).await.unwrap();
    let pid = mounted.pid.unwrap();
    process::terminate(pid).unwrap();

    // Teardown has nothing left to kill; the record must go regardless.
    let gone = f.manager.unmount(&f.target).await.unwrap();
    assert!(!gone.mounted);
    assert_eq!(gone.pid, Some(pid));
    assert_eq!(f.manager.count().await, 0);

    let status = f.manager.status(&f.target).await.unwrap();
    assert!(!status.mounted);
    assert_eq!(status.pid, None);
}

#[tokio::test]
async fn test_background_sweeper_purges_dead_mounts() {
    let f = fixture(HelperBehavior::StayUp);

    let mounted = f.manager.mount(request(&f.target)).await.unwrap();
    process::terminate(mounted.pid.unwrap()).unwrap();

    f.manager.start_sweeper();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(f.manager.count().await, 0);
    f.manager.stop_sweeper();
}

#[tokio::test]
async fn test_remount_after_death_replaces_record() {
    let f = fixture(HelperBehavior::StayUp);

    let first = f.manager.mount(request(&f.target)).await.unwrap();
    process::terminate(first.pid.unwrap()).unwrap();

    let second = f.manager.mount(request(&f.target)).await.unwrap();
    assert!(second.mounted);
    assert_ne!(first.pid, second.pid);
    assert_eq!(f.helper.spawn_count(), 2);
    assert_eq!(f.manager.count().await, 1);

    f.manager.unmount(&f.target).await.unwrap();
}

#[tokio::test]
async fn test_unavailable_helper_leaves_registry_untouched() {
    let f = fixture(HelperBehavior::Unavailable);

    let err = f.manager.mount(request(&f.target)).await.unwrap_err();
    assert!(matches!(err, MountError::HelperUnavailable(_)));
    assert_eq!(f.helper.spawn_count(), 0);
    assert_eq!(f.manager.count().await, 0);
}

#[tokio::test]
async fn test_early_exit_reported_with_diagnostic() {
    let f = fixture(HelperBehavior::DieFast);

    let err = f.manager.mount(request(&f.target)).await.unwrap_err();
    assert!(matches!(err, MountError::EarlyExit(_)));
    assert!(err.to_string().contains("driver"));
    assert_eq!(f.manager.count().await, 0);
}

#[tokio::test]
async fn test_empty_target_rejected() {
    let f = fixture(HelperBehavior::StayUp);

    let err = f.manager.mount(request("")).await.unwrap_err();
    assert!(matches!(err, MountError::Validation(_)));
    assert_eq!(f.helper.spawn_count(), 0);
}

#[tokio::test]
async fn test_unmount_unknown_path_is_not_mounted() {
    let f = fixture(HelperBehavior::StayUp);

    let err = f.manager.unmount("/nowhere/mounted").await.unwrap_err();
    assert!(matches!(err, MountError::NotMounted(_)));
}

#[tokio::test]
async fn test_mount_creates_target_directory_and_profile() {
    let f = fixture(HelperBehavior::StayUp);

    f.manager.mount(request(&f.target)).await.unwrap();

    assert!(Path::new(&f.target).is_dir());

    let profile = std::fs::read_to_string(f._dir.path().join("rclone.conf")).unwrap();
    assert!(profile.contains("[debrid]"));
    assert!(profile.contains("pass = obscured:hunter2"));

    f.manager.unmount(&f.target).await.unwrap();
}

#[tokio::test]
async fn test_status_of_untracked_path_is_unmounted() {
    let f = fixture(HelperBehavior::StayUp);

    let status = f.manager.status("/never/mounted").await.unwrap();
    assert!(!status.mounted);
    assert_eq!(status.pid, None);
    assert_eq!(status.error, None);
}

#[tokio::test]
async fn test_unmount_all_clears_registry() {
    let f = fixture(HelperBehavior::StayUp);
    let second_target = f._dir.path().join("mnt2").to_string_lossy().into_owned();

    f.manager.mount(request(&f.target)).await.unwrap();
    f.manager.mount(request(&second_target)).await.unwrap();
    assert_eq!(f.manager.count().await, 2);

    f.manager.unmount_all().await;
    assert_eq!(f.manager.count().await, 0);
}
