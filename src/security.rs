//! File permission helpers for secret-bearing files
//!
//! Secrets and generated `.env` files are written owner-only (`0600`) inside
//! owner-only directories (`0700`). On non-Unix platforms the permission
//! calls are no-ops.

use crate::error::{create_dir, Error, Result};
use std::path::Path;

/// Restrict a file to owner read/write (Unix: 0o600)
///
/// # Errors
///
/// Returns `Error::FileWrite` if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_secure_file_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o600)
}

/// Restrict a directory to owner access (Unix: 0o700)
///
/// # Errors
///
/// Returns `Error::FileWrite` if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_secure_dir_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
pub fn set_secure_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn set_secure_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Ensure a directory exists; newly created directories are made owner-only
///
/// Existing directories keep their permissions so that pointing the output
/// at e.g. a project root does not chmod it.
///
/// # Errors
///
/// Returns an error if directory creation or permission setting fails.
pub fn ensure_secure_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }

    create_dir(path)?;
    set_secure_dir_permissions(path)
}

/// Write `content` to `path` atomically with owner-only permissions
///
/// The content goes to a sibling `<name>.tmp` file which is chmod'ed before
/// being renamed over the target, so the final path never exists with
/// broader permissions.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the write fails.
pub fn write_secure_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_secure_dir(parent)?;
    }

    let file_name = path.file_name().ok_or_else(|| Error::FileWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    std::fs::write(&temp_path, content).map_err(|e| Error::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    set_secure_file_permissions(&temp_path)?;

    std::fs::rename(&temp_path, path).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_secure_file_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/.env");

        write_secure_file(&path, "A=1\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\n");
        assert!(!path.with_file_name(".env.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_secure_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let parent = dir.path().join("secure");
        let path = parent.join("secrets.local.yaml");

        write_secure_file(&path, "key: value\n").unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = fs::metadata(&parent).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_dir_permissions_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let existing = dir.path().join("project");
        fs::create_dir(&existing).unwrap();
        fs::set_permissions(&existing, fs::Permissions::from_mode(0o755)).unwrap();

        write_secure_file(&existing.join(".env"), "A=1").unwrap();

        let mode = fs::metadata(&existing).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
