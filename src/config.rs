//! Configuration parsing and structures

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::env::substitute_env_vars;
use crate::error::{MountError, Result};
use crate::profile::RemoteCredentials;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Mount helper configuration
    #[serde(default)]
    pub helper: HelperConfig,

    /// Remote mounts to manage
    pub mounts: Vec<MountDeclaration>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External mount helper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HelperConfig {
    /// Helper binary name or path
    #[serde(default = "default_helper_binary")]
    pub binary: String,

    /// Remote profile file location; defaults to the helper's conventional
    /// per-OS location when unset
    pub profile_path: Option<PathBuf>,
}

fn default_helper_binary() -> String {
    "rclone".to_string()
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            binary: default_helper_binary(),
            profile_path: None,
        }
    }
}

/// One remote mount: target path, credentials, and pass-through options
#[derive(Debug, Clone, Deserialize)]
pub struct MountDeclaration {
    /// Mount target. A bare drive letter on Windows (`"D"`, `"D:"`), a
    /// directory path everywhere else.
    pub path: String,

    /// Logical remote name, used as the profile block name and registry label
    pub remote: String,

    /// Remote endpoint URL
    pub endpoint: String,

    /// Remote username; supports `${VAR}` substitution
    pub username: String,

    /// Remote secret; supports `${VAR}` substitution
    pub secret: String,

    /// Operational parameters forwarded verbatim to the helper
    #[serde(default)]
    pub options: MountOptions,
}

impl MountDeclaration {
    /// Credentials for the profile store
    pub fn credentials(&self) -> RemoteCredentials {
        RemoteCredentials {
            remote_name: self.remote.clone(),
            endpoint: self.endpoint.clone(),
            username: self.username.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Helper pass-through parameters. This subsystem never interprets the values;
/// they go onto the helper's command line verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct MountOptions {
    /// VFS cache mode (off, minimal, writes, full)
    #[serde(default = "default_cache_mode")]
    pub cache_mode: String,

    /// Max VFS cache size (e.g. "10G")
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: String,

    /// Max age of VFS cache objects (e.g. "12h")
    #[serde(default = "default_cache_max_age", with = "humantime_serde")]
    pub cache_max_age: Duration,

    /// Per-file read buffer size (e.g. "32M")
    #[serde(default = "default_buffer_size")]
    pub buffer_size: String,

    /// Directory listing cache duration (e.g. "5m")
    #[serde(default = "default_dir_cache_time", with = "humantime_serde")]
    pub dir_cache_time: Duration,

    /// Remote change poll interval (e.g. "30s")
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_cache_mode() -> String {
    "full".to_string()
}

fn default_cache_max_size() -> String {
    "10G".to_string()
}

fn default_cache_max_age() -> Duration {
    Duration::from_secs(12 * 3600)
}

fn default_buffer_size() -> String {
    "32M".to_string()
}

fn default_dir_cache_time() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            cache_mode: default_cache_mode(),
            cache_max_size: default_cache_max_size(),
            cache_max_age: default_cache_max_age(),
            buffer_size: default_buffer_size(),
            dir_cache_time: default_dir_cache_time(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MountError::Config(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| MountError::Config(format!("failed to parse config: {}", e)))?;

        // Credential fields may reference environment variables so secrets
        // never need to live in the file itself.
        for mount in &mut config.mounts {
            mount.endpoint = substitute_env_vars(&mount.endpoint)?;
            mount.username = substitute_env_vars(&mount.username)?;
            mount.secret = substitute_env_vars(&mount.secret)?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mounts.is_empty() {
            return Err(MountError::Config(
                "at least one mount is required".to_string(),
            ));
        }

        let mut paths = HashSet::new();
        for mount in &self.mounts {
            if mount.path.trim().is_empty() {
                return Err(MountError::Config(format!(
                    "mount for remote {:?} has an empty path",
                    mount.remote
                )));
            }
            if mount.remote.trim().is_empty() {
                return Err(MountError::Config(format!(
                    "mount at {:?} has an empty remote name",
                    mount.path
                )));
            }
            if !paths.insert(&mount.path) {
                return Err(MountError::Config(format!(
                    "duplicate mount path: {:?}",
                    mount.path
                )));
            }
        }

        Ok(())
    }
}
