//! Package assembly through the packaging backend (fpm).
//!
//! The backend packs the working tree, mapped onto the release directory,
//! into a native package with the generated post-install hook attached.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Failure;
use crate::manifest::Manifest;
use crate::process::{Cmd, Runner};
use crate::release::ReleaseId;

/// The one native package format produced.
pub const PACKAGE_FORMAT: &str = "deb";

/// Everything the backend needs for one package.
#[derive(Debug, Clone)]
pub struct PackageRequest<'a> {
    pub manifest: &'a Manifest,
    pub release: &'a ReleaseId,
    /// Root of the future release directory contents.
    pub work_tree: &'a Path,
    /// Generated lifecycle script, registered as the post-install hook.
    pub postinst: &'a Path,
    pub dependencies: &'a BTreeSet<String>,
    /// Where the package file is written.
    pub output_dir: &'a Path,
}

impl PackageRequest<'_> {
    /// `<name>_<version>.deb`
    pub fn artifact_file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.manifest.name, self.release, PACKAGE_FORMAT
        )
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(self.artifact_file_name())
    }

    /// Backend invocation. Arguments are passed as-is, never through a
    /// shell.
    pub fn backend_command(&self, backend: &str) -> Cmd {
        let manifest = self.manifest;
        let mut cmd = Cmd::new(backend)
            .args(["-s", "dir", "-t", PACKAGE_FORMAT])
            .arg("-n")
            .arg(&manifest.name)
            .arg("-v")
            .arg(self.release.as_str())
            .arg("-p")
            .arg_path(&self.artifact_path())
            .arg("--vendor")
            .arg(&manifest.vendor)
            .arg("--maintainer")
            .arg(&manifest.maintainer)
            .arg("--url")
            .arg(&manifest.url)
            .arg("-C")
            .arg_path(self.work_tree)
            .arg(format!("--no-{PACKAGE_FORMAT}-use-file-permissions"));

        for dep in self.dependencies {
            cmd = cmd.arg("-d").arg(dep);
        }

        let mut mapping = std::ffi::OsString::from(".=");
        mapping.push(manifest.release_dir(self.release.as_str()).as_os_str());
        cmd.arg("--after-install")
            .arg_path(self.postinst)
            .arg(mapping)
            .error_msg(format!("running {backend}"))
    }
}

/// Counts of what is about to be packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
}

/// Walk the working tree without following links; log each link.
pub fn summarize_tree(work_tree: &Path) -> TreeSummary {
    let mut summary = TreeSummary::default();
    for entry in WalkDir::new(work_tree)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            summary.symlinks += 1;
            if let Ok(target) = std::fs::read_link(entry.path()) {
                debug!(
                    stage = "package",
                    link = %entry.path().display(),
                    target = %target.display(),
                    "symlink"
                );
            }
        } else if file_type.is_dir() {
            summary.dirs += 1;
        } else {
            summary.files += 1;
        }
    }
    summary
}

/// Run the backend and return the produced package path.
pub fn build_package(
    runner: &mut dyn Runner,
    backend: &str,
    request: &PackageRequest<'_>,
) -> Result<PathBuf> {
    let summary = summarize_tree(request.work_tree);
    info!(
        stage = "package",
        files = summary.files,
        dirs = summary.dirs,
        symlinks = summary.symlinks,
        dependencies = ?request.dependencies,
        "assembling package"
    );

    let cmd = request.backend_command(backend);
    runner.run(&cmd)?;

    let artifact = request.artifact_path();
    if !artifact.is_file() {
        return Err(Failure::Execution {
            command: cmd.to_string(),
            status: format!("finished but '{}' is missing", artifact.display()),
        }
        .into());
    }

    info!("created file {}", request.artifact_file_name());
    Ok(artifact)
}
