use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mount lifecycle operations
#[derive(Error, Debug)]
pub enum MountError {
    #[error("Invalid mount request: {0}")]
    Validation(String),

    #[error("Mount helper unavailable: {0}")]
    HelperUnavailable(String),

    #[error("Failed to start mount helper: {0}")]
    Spawn(String),

    #[error("Mount helper exited during startup: {0}")]
    EarlyExit(String),

    #[error("Failed to terminate mount helper: {0}")]
    Teardown(String),

    #[error("No mount at {0:?}")]
    NotMounted(PathBuf),

    #[error("Remote profile error: {0}")]
    Profile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for mount lifecycle operations
pub type Result<T> = std::result::Result<T, MountError>;
