//! External mount helper integration
//!
//! The actual mount protocol lives in an opaque external binary (rclone or a
//! compatible fork). This module owns everything about talking to it: the
//! availability probe, the secret-obscuring subcommand, platform-specific
//! argument assembly, and the detached spawn. The `MountHelper` trait keeps it
//! replaceable so a different backend can be swapped in without touching the
//! registry, sweeper, or teardown logic.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::config::MountOptions;
use crate::error::{MountError, Result};

/// Strategy interface to the external mounting backend
#[async_trait]
pub trait MountHelper: Send + Sync {
    /// Lightweight availability probe. Returns the helper's version line.
    async fn probe_version(&self) -> Result<String>;

    /// Encode a secret with the helper's own obscuring subcommand.
    async fn obscure(&self, secret: &str) -> Result<String>;

    /// Build the argument vector for mounting `remote` at `target`.
    fn mount_args(
        &self,
        remote: &str,
        target: &Path,
        options: &MountOptions,
        profile_path: &Path,
    ) -> Vec<OsString>;

    /// Spawn the helper as a detached background process.
    fn spawn_mount(&self, args: Vec<OsString>) -> Result<Child>;
}

/// Default helper implementation driving an rclone-compatible binary
pub struct RcloneHelper {
    binary: PathBuf,
}

impl RcloneHelper {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Path of the helper binary this instance drives
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl MountHelper for RcloneHelper {
    async fn probe_version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                MountError::HelperUnavailable(format!("{:?}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            return Err(MountError::HelperUnavailable(format!(
                "{:?} version check exited with {}",
                self.binary, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if version.is_empty() {
            return Err(MountError::HelperUnavailable(format!(
                "{:?} version check produced no output",
                self.binary
            )));
        }
        Ok(version)
    }

    async fn obscure(&self, secret: &str) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("obscure")
            .arg(secret)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MountError::Profile(format!("obscure invocation failed: {}", e)))?;

        if !output.status.success() {
            return Err(MountError::Profile(format!(
                "obscure exited with {}",
                output.status
            )));
        }

        let obscured = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if obscured.is_empty() {
            return Err(MountError::Profile("obscure produced no output".to_string()));
        }
        Ok(obscured)
    }

    fn mount_args(
        &self,
        remote: &str,
        target: &Path,
        options: &MountOptions,
        profile_path: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "mount".into(),
            format!("{}:", remote).into(),
            target.as_os_str().to_os_string(),
            "--config".into(),
            profile_path.as_os_str().to_os_string(),
        ];

        // Operational parameters are forwarded verbatim; this subsystem never
        // interprets them.
        for (flag, value) in [
            ("--vfs-cache-mode", options.cache_mode.clone()),
            ("--vfs-cache-max-size", options.cache_max_size.clone()),
            (
                "--vfs-cache-max-age",
                humantime::format_duration(options.cache_max_age).to_string(),
            ),
            ("--buffer-size", options.buffer_size.clone()),
            (
                "--dir-cache-time",
                humantime::format_duration(options.dir_cache_time).to_string(),
            ),
            (
                "--poll-interval",
                humantime::format_duration(options.poll_interval).to_string(),
            ),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }

        #[cfg(unix)]
        {
            args.push("--allow-other".into());
            args.push("--daemon".into());
        }

        #[cfg(windows)]
        {
            args.push("--links".into());
        }

        args
    }

    fn spawn_mount(&self, args: Vec<OsString>) -> Result<Child> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        #[cfg(windows)]
        {
            use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
            .spawn()
            .map_err(|e| MountError::Spawn(format!("{:?}: {}", self.binary, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options() -> MountOptions {
        MountOptions {
            cache_mode: "full".to_string(),
            cache_max_size: "10G".to_string(),
            cache_max_age: Duration::from_secs(12 * 3600),
            buffer_size: "32M".to_string(),
            dir_cache_time: Duration::from_secs(300),
            poll_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_mount_args_forward_options_verbatim() {
        let helper = RcloneHelper::new("rclone");
        let args = helper.mount_args(
            "debrid",
            Path::new("/mnt/remote"),
            &options(),
            Path::new("/tmp/rclone.conf"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "mount");
        assert_eq!(args[1], "debrid:");
        assert_eq!(args[2], "/mnt/remote");

        let pair = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).expect(flag);
            args[idx + 1].clone()
        };
        assert_eq!(pair("--config"), "/tmp/rclone.conf");
        assert_eq!(pair("--vfs-cache-mode"), "full");
        assert_eq!(pair("--vfs-cache-max-size"), "10G");
        assert_eq!(pair("--buffer-size"), "32M");
        assert_eq!(pair("--dir-cache-time"), "5m");
        assert_eq!(pair("--poll-interval"), "30s");
    }

    #[cfg(unix)]
    #[test]
    fn test_mount_args_include_posix_flags() {
        let helper = RcloneHelper::new("rclone");
        let args = helper.mount_args(
            "debrid",
            Path::new("/mnt/remote"),
            &options(),
            Path::new("/tmp/rclone.conf"),
        );
        assert!(args.iter().any(|a| a == "--allow-other"));
        assert!(args.iter().any(|a| a == "--daemon"));
    }

    #[tokio::test]
    async fn test_probe_version_missing_binary() {
        let helper = RcloneHelper::new("/nonexistent/helper-binary");
        let err = helper.probe_version().await.unwrap_err();
        assert!(matches!(err, MountError::HelperUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_obscure_failure_is_profile_error() {
        let helper = RcloneHelper::new("false");
        let err = helper.obscure("secret").await.unwrap_err();
        assert!(matches!(err, MountError::Profile(_)));
    }
}
