//! OS-level process liveness, termination, and mount detachment
//!
//! Everything platform-specific about "is the helper still running", "kill it",
//! and "ask the OS to release the mount point" lives behind this module so the
//! rest of the subsystem never branches on the target OS. Probe failures are
//! read conservatively as "not running".

use std::path::Path;

#[cfg(unix)]
pub use self::unix::{is_alive, terminate};
#[cfg(windows)]
pub use self::windows::{is_alive, terminate};

/// Ask the OS to gracefully release the mount at `path`.
///
/// POSIX tries the FUSE-specific detach first and falls back to the generic
/// unmount utility. Windows has no graceful path for helper-backed mounts;
/// callers proceed straight to forced termination there.
pub fn detach_mount(path: &Path) -> bool {
    #[cfg(unix)]
    {
        for (program, args) in [("fusermount", &["-u"][..]), ("umount", &[][..])] {
            let result = std::process::Command::new(program)
                .args(args)
                .arg(path)
                .output();
            if matches!(result, Ok(output) if output.status.success()) {
                return true;
            }
        }
        false
    }

    #[cfg(windows)]
    {
        let _ = path;
        false
    }
}

#[cfg(unix)]
mod unix {
    /// Check whether `pid` refers to a running process.
    ///
    /// Reaps first so an exited-but-unwaited child is not reported alive by
    /// the signal probe.
    pub fn is_alive(pid: u32) -> bool {
        let pid = pid as libc::pid_t;
        unsafe {
            let mut status = 0;
            if libc::waitpid(pid, &mut status, libc::WNOHANG) == pid {
                return false;
            }
            libc::kill(pid, 0) == 0
        }
    }

    /// Forcibly terminate `pid` and reap it if it was our child.
    pub fn terminate(pid: u32) -> std::io::Result<()> {
        let pid = pid as libc::pid_t;
        unsafe {
            if libc::kill(pid, libc::SIGKILL) != 0 {
                let err = std::io::Error::last_os_error();
                // Already gone counts as success.
                if err.raw_os_error() == Some(libc::ESRCH) {
                    return Ok(());
                }
                return Err(err);
            }
            let mut status = 0;
            libc::waitpid(pid, &mut status, 0);
        }
        Ok(())
    }
}

#[cfg(windows)]
mod windows {
    use std::os::windows::process::CommandExt;

    use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
    use windows_sys::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, CREATE_NO_WINDOW, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    /// Check whether `pid` refers to a running process via its exit code.
    pub fn is_alive(pid: u32) -> bool {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle == 0 {
                return false;
            }
            let mut code = 0u32;
            let ok = GetExitCodeProcess(handle, &mut code);
            CloseHandle(handle);
            ok != 0 && code == STILL_ACTIVE as u32
        }
    }

    /// Terminate `pid` together with its whole process tree.
    ///
    /// Helper children hold mount handles of their own; killing only the root
    /// process leaves the mount point orphaned.
    pub fn terminate(pid: u32) -> std::io::Result<()> {
        let output = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .creation_flags(CREATE_NO_WINDOW)
            .output()?;
        if output.status.success() || !is_alive(pid) {
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "taskkill failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}
