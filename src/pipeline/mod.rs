//! The packaging pipeline.
//!
//! Stages run strictly in order and the first failure aborts the run:
//!
//! ```text
//! detect runtime -> provision host -> run instructions -> shared links
//!     -> post-install script -> dependency set -> fpm -> checksum
//! ```
//!
//! Manifest validation happens before this module is entered. The working
//! tree lives in a scratch directory that is removed when the run ends,
//! unless it is kept for inspection.

pub mod deps;
pub mod scripts;

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

use crate::artifact::{build_package, write_checksum, PackageRequest};
use crate::executor::directories::{handle_dirmode, DIR_MODE};
use crate::executor::run_instructions;
use crate::layout::build_shared_links;
use crate::manifest::Manifest;
use crate::preflight::{detect_runtime, provision};
use crate::process::Runner;
use crate::release::ReleaseId;
use crate::settings::Settings;

pub use deps::resolve_dependencies;
pub use scripts::LifecycleScript;

/// Run-level switches from the command line.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory the package and its checksum are written to.
    pub output_dir: PathBuf,
    /// Leave the scratch directory in place after the run.
    pub keep_workdir: bool,
    /// Assume build packages and fpm are already installed.
    pub skip_provision: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            keep_workdir: false,
            skip_provision: false,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub artifact: PathBuf,
    pub checksum: PathBuf,
    pub dependencies: BTreeSet<String>,
    /// Scratch directory, when kept.
    pub workdir: Option<PathBuf>,
}

/// Scratch space for one run: `fpm/` is the working tree, `scripts/` holds
/// the lifecycle script.
pub struct Scratch {
    dir: TempDir,
    work_tree: PathBuf,
    scripts_dir: PathBuf,
}

impl Scratch {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("minecart-")
            .tempdir()
            .context("creating scratch directory")?;
        let work_tree = dir.path().join("fpm");
        let scripts_dir = dir.path().join("scripts");
        handle_dirmode(&work_tree, DIR_MODE)?;
        handle_dirmode(&scripts_dir, DIR_MODE)?;
        Ok(Self {
            dir,
            work_tree,
            scripts_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Persist the scratch directory past the end of the run.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

/// Build a package for a validated manifest.
pub fn run_pipeline(
    runner: &mut dyn Runner,
    settings: &Settings,
    manifest: &Manifest,
    release: &ReleaseId,
    options: &BuildOptions,
) -> Result<BuildOutcome> {
    info!(
        stage = "pipeline",
        name = %manifest.name,
        release = %release,
        "starting build"
    );

    let runtime = detect_runtime(runner, settings)?;
    info!(stage = "provision", runtime = %runtime, "detected runtime");
    if options.skip_provision {
        info!(stage = "provision", "skipping host provisioning");
    } else {
        provision(runner, settings, &manifest.build_deps, &runtime)?;
    }

    let scratch = Scratch::create()?;
    let built = build_in_scratch(runner, settings, manifest, release, options, &scratch, &runtime);

    let workdir = if options.keep_workdir {
        let path = scratch.keep();
        info!(stage = "pipeline", workdir = %path.display(), "kept working directory");
        Some(path)
    } else {
        None
    };

    let (artifact, dependencies) = built?;
    let checksum = write_checksum(&artifact)?;
    info!(stage = "pipeline", checksum = %checksum.display(), "wrote checksum");

    Ok(BuildOutcome {
        artifact,
        checksum,
        dependencies,
        workdir,
    })
}

fn build_in_scratch(
    runner: &mut dyn Runner,
    settings: &Settings,
    manifest: &Manifest,
    release: &ReleaseId,
    options: &BuildOptions,
    scratch: &Scratch,
    runtime: &crate::preflight::RuntimeVersion,
) -> Result<(PathBuf, BTreeSet<String>)> {
    run_instructions(
        runner,
        &settings.shell,
        scratch.work_tree(),
        &manifest.instructions,
    )?;

    build_shared_links(
        scratch.work_tree(),
        &manifest.shared_root(),
        &manifest.configuration_files,
    )?;

    let postinst = LifecycleScript::new(manifest, release).write(scratch.scripts_dir())?;

    let dependencies = resolve_dependencies(
        &manifest.install_deps,
        runtime,
        &settings.runtime_package_prefix,
        &settings.extra_runtime_deps,
    );
    info!(stage = "dependencies", dependencies = ?dependencies, "package dependencies");

    let request = PackageRequest {
        manifest,
        release,
        work_tree: scratch.work_tree(),
        postinst: &postinst,
        dependencies: &dependencies,
        output_dir: &options.output_dir,
    };
    let artifact = build_package(runner, &settings.backend_command, &request)?;
    Ok((artifact, dependencies))
}
