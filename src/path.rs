//! Canonical mount-path handling
//!
//! The registry keys every mount by an OS-normalized form of its target path.
//! Windows accepts bare drive-letter targets (`"D"`, `"D:"`), which normalize
//! to the root form `"D:\"`; everything else resolves to an absolute path.

use std::path::{Component, Path, PathBuf};

use crate::error::{MountError, Result};

/// Returns the drive root (`"D:\"`) when the target is a bare drive letter
/// such as `"D"` or `"D:"`, in any case.
pub fn drive_letter_root(target: &str) -> Option<String> {
    let mut chars = target.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    match chars.as_str() {
        "" | ":" | ":\\" | ":/" => Some(format!("{}:\\", letter.to_ascii_uppercase())),
        _ => None,
    }
}

/// True when the target addresses a drive letter rather than a directory.
///
/// Drive-letter mounts must not have a pre-existing folder at the target, so
/// the directory-creation precondition is skipped for them.
pub fn is_drive_target(target: &str) -> bool {
    drive_letter_root(target).is_some()
}

/// Normalize a mount target into the canonical registry key.
pub fn canonicalize_target(target: &str) -> Result<PathBuf> {
    if target.trim().is_empty() {
        return Err(MountError::Validation(
            "mount path must not be empty".to_string(),
        ));
    }

    if cfg!(windows) {
        if let Some(root) = drive_letter_root(target) {
            return Ok(PathBuf::from(root));
        }
    }

    let path = Path::new(target);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(clean_components(&absolute))
}

/// Lexically remove `.` components and trailing separators so that equivalent
/// spellings of the same target collapse to one key. Does not touch `..` and
/// does not hit the filesystem, since the target may not exist yet.
fn clean_components(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
