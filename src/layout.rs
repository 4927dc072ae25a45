//! Shared-directory link topology.
//!
//! Releases are immutable directories under `<app>/releases/<id>`; mutable
//! state (logs, pids, uploads, operator-managed config) lives once under
//! `<app>/shared` and every release links into it. This stage rewrites the
//! working tree so those paths are symlinks into the shared layout.
//!
//! Link targets are absolute paths on the install target. They usually
//! dangle on the build host.

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Failure;
use crate::executor::directories::{handle_dirmode, DIR_MODE};
use crate::executor::files::relink;

/// One link created in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    /// Path relative to the working tree root.
    pub path: PathBuf,
    pub target: PathBuf,
}

/// Build the shared links inside `work_tree`.
///
/// `shared` is `<install_directory>/<name>/shared` on the target host.
/// Running this again over a tree that already has the links replaces them.
pub fn build_shared_links(
    work_tree: &Path,
    shared: &Path,
    configuration_files: &[PathBuf],
) -> Result<Vec<SharedLink>> {
    info!(stage = "layout", shared = %shared.display(), "linking shared paths");

    let tmp = work_tree.join("tmp");
    handle_dirmode(&tmp, DIR_MODE).map_err(|err| layout_failure(err, "tmp"))?;

    let mut links = vec![
        link_into_shared(work_tree, Path::new("log"), dir_target(shared, "log"))?,
        link_into_shared(work_tree, Path::new("tmp/pids"), dir_target(shared, "pids"))?,
    ];

    let system = Path::new("public/system");
    if work_tree.join(system).symlink_metadata().is_ok() {
        links.push(link_into_shared(work_tree, system, dir_target(shared, "system"))?);
    }

    for config in configuration_files {
        links.push(link_into_shared(work_tree, config, shared.join(config))?);
    }

    for link in &links {
        debug!(
            stage = "layout",
            path = %link.path.display(),
            target = %link.target.display(),
            "linked"
        );
    }
    Ok(links)
}

fn link_into_shared(work_tree: &Path, relative: &Path, target: PathBuf) -> Result<SharedLink> {
    // Never replace the tree root or one of its ancestors.
    if relative.file_name().is_none() {
        return Err(Failure::Layout(format!(
            "'{}' does not name an entry in the working tree",
            relative.display()
        ))
        .into());
    }
    relink(&work_tree.join(relative), &target)
        .map_err(|err| layout_failure(err, &relative.display().to_string()))?;
    Ok(SharedLink {
        path: relative.to_path_buf(),
        target,
    })
}

/// `<shared>/<name>/`; the trailing slash marks the target as a directory.
fn dir_target(shared: &Path, name: &str) -> PathBuf {
    let mut target: OsString = shared.join(name).into_os_string();
    target.push("/");
    PathBuf::from(target)
}

fn layout_failure(err: anyhow::Error, path: &str) -> anyhow::Error {
    err.context(Failure::Layout(format!("building shared link '{path}'")))
}
