//! remote-mount: remote filesystem mount lifecycle management
//!
//! This library attaches cloud/debrid storage backends to local paths by
//! driving an external rclone-style helper binary, and keeps an in-memory view
//! of mount state consistent with the helper's actual OS-level liveness.
//!
//! # Architecture
//!
//! - **Helper**: the opaque external mounting binary, reached through the
//!   replaceable `MountHelper` strategy (version probe, secret obscuring,
//!   argument assembly, detached spawn).
//! - **Profile Store**: idempotently materializes the helper's remote
//!   connection profile from stored credentials.
//! - **Mount Manager**: the registry of live mounts plus supervision,
//!   teardown, health sweeping, and status queries.
//! - **Process layer**: the only platform-specific code: liveness probes,
//!   forced termination, and graceful mount detachment.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use remote_mount::helper::RcloneHelper;
//! use remote_mount::manager::{MountManager, MountRequest};
//! use remote_mount::profile::{ProfileStore, RemoteCredentials};
//!
//! # async fn example() -> remote_mount::Result<()> {
//! let helper = Arc::new(RcloneHelper::new("rclone"));
//! let profiles = ProfileStore::new(ProfileStore::default_path()?);
//! let manager = Arc::new(MountManager::new(helper, profiles));
//! manager.start_sweeper();
//!
//! let status = manager
//!     .mount(MountRequest {
//!         target: "/mnt/remote".to_string(),
//!         credentials: RemoteCredentials {
//!             remote_name: "debrid".to_string(),
//!             endpoint: "https://dav.example.com/webdav".to_string(),
//!             username: "media".to_string(),
//!             secret: "secret".to_string(),
//!         },
//!         options: Default::default(),
//!     })
//!     .await?;
//! assert!(status.mounted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod helper;
pub mod manager;
pub mod path;
pub mod process;
pub mod profile;

pub use error::{MountError, Result};
