//! File operation handlers used while shaping the working tree.
//!
//! Paths are absolute here; callers join tree-relative paths first.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Remove whatever is at `path` (file, symlink or directory tree).
///
/// Returns `Ok(false)` when nothing was there. Any other error is reported.
/// Symlinks are removed, never followed.
pub fn remove_if_present(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("inspecting '{}'", path.display()));
        }
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("removing '{}'", path.display())),
    }
}

/// Create `link` pointing at `target`, creating the link's parent first.
///
/// Fails if something already exists at `link`.
pub fn handle_symlink(link: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory '{}'", parent.display()))?;
    }
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "linking '{}' -> '{}'",
            link.display(),
            target.display()
        )
    })
}

/// Replace whatever is at `link` with a symlink to `target`.
pub fn relink(link: &Path, target: &Path) -> Result<()> {
    remove_if_present(link)?;
    handle_symlink(link, target)
}

/// Write a file and set its permission bits.
pub fn handle_writefilemode(path: &Path, content: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory '{}'", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("writing '{}'", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting permissions '{}'", path.display()))?;
    Ok(())
}
