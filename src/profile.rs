//! Remote connection profile materialization
//!
//! The helper binary reads its remote definitions from an INI-style profile
//! file (one named block of `key = value` lines per remote). This module keeps
//! that file in sync with the credentials supplied by the settings store: the
//! file is rewritten whole on every update, never appended, so repeated calls
//! with the same credentials are byte-for-byte idempotent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::{debug, warn};

use crate::error::{MountError, Result};
use crate::helper::MountHelper;

/// Credentials for one logical remote, as supplied by the settings store.
/// All fields are treated as opaque validated strings.
#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    pub remote_name: String,
    pub endpoint: String,
    pub username: String,
    pub secret: String,
}

/// Writes and maintains the helper's remote profile file
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The helper's conventional per-OS profile location
    /// (`~/.config/rclone/rclone.conf` on POSIX, `%APPDATA%\rclone\rclone.conf`
    /// on Windows).
    pub fn default_path() -> Result<PathBuf> {
        let dirs = BaseDirs::new().ok_or_else(|| {
            MountError::Profile("no home directory for profile location".to_string())
        })?;
        Ok(dirs.config_dir().join("rclone").join("rclone.conf"))
    }

    /// Location of the profile file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the profile matches the given credentials.
    ///
    /// The secret is encoded through the helper's own obscuring subcommand. If
    /// that fails for any reason (helper missing, non-zero exit, empty output)
    /// the plaintext secret is stored instead and a warning is logged: a
    /// degraded mode, not a silent corruption.
    pub async fn ensure(
        &self,
        credentials: &RemoteCredentials,
        helper: &dyn MountHelper,
    ) -> Result<()> {
        let secret = match helper.obscure(&credentials.secret).await {
            Ok(obscured) => obscured,
            Err(e) => {
                warn!(
                    remote = %credentials.remote_name,
                    "Secret obscuring failed ({}), storing plaintext secret",
                    e
                );
                credentials.secret.clone()
            }
        };

        let contents = render_profile(credentials, &secret);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_restricted(&self.path, contents.as_bytes())?;
        debug!(remote = %credentials.remote_name, path = ?self.path, "Remote profile written");
        Ok(())
    }
}

/// Render the single-remote profile block
fn render_profile(credentials: &RemoteCredentials, secret: &str) -> String {
    format!(
        "[{}]\ntype = webdav\nurl = {}\nvendor = other\nuser = {}\npass = {}\n",
        credentials.remote_name, credentials.endpoint, credentials.username, secret
    )
}

/// Overwrite `path` with `contents`, owner read/write only
fn write_restricted(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;

    // The mode on OpenOptions only applies at creation; clamp pre-existing
    // files too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
