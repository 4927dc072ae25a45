//! Build host provisioning.
//!
//! Brings the host to a state where the manifest's build dependencies, the
//! runtime's development headers and the packaging backend are installed.
//! Every step is fatal on failure; nothing is retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use minecart::preflight::{detect_runtime, provision};
//!
//! let runtime = detect_runtime(&mut runner, &settings)?;
//! provision(&mut runner, &settings, &manifest.build_deps, &runtime)?;
//! ```

pub mod runtime;

pub use runtime::{detect_runtime, RuntimeVersion};

use anyhow::Result;
use tracing::info;

use crate::error::Failure;
use crate::process::{Cmd, Runner};
use crate::settings::Settings;

/// Install everything the build needs.
pub fn provision(
    runner: &mut dyn Runner,
    settings: &Settings,
    build_deps: &[String],
    runtime: &RuntimeVersion,
) -> Result<()> {
    let packages = build_packages(settings, build_deps, runtime);
    install_packages(runner, settings, &packages)?;
    install_backend(runner, settings)
}

/// Manifest build deps, then the runtime headers, then the fixed build
/// tools. Duplicates are dropped, keeping first position.
pub fn build_packages(
    settings: &Settings,
    build_deps: &[String],
    runtime: &RuntimeVersion,
) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    let candidates = build_deps
        .iter()
        .cloned()
        .chain(std::iter::once(
            runtime.dev_package(&settings.runtime_package_prefix),
        ))
        .chain(settings.build_tools.iter().cloned());
    for package in candidates {
        if !packages.contains(&package) {
            packages.push(package);
        }
    }
    packages
}

/// Refresh the package index, then batch-install non-interactively.
///
/// `DEBIAN_FRONTEND` is set on the install invocation only.
pub fn install_packages(
    runner: &mut dyn Runner,
    settings: &Settings,
    packages: &[String],
) -> Result<()> {
    info!(stage = "provision", packages = ?packages, "installing build packages");

    let manager = &settings.package_manager;
    runner
        .run(&Cmd::new(manager).args(["update", "-q"]))
        .map_err(|err| err.context(Failure::Environment(format!("running {manager} update"))))?;

    if packages.is_empty() {
        return Ok(());
    }

    let install = Cmd::new(manager)
        .args(["install", "-y", "--no-install-recommends"])
        .args(packages)
        .env("DEBIAN_FRONTEND", "noninteractive");
    runner
        .run(&install)
        .map_err(|err| err.context(Failure::Environment("installing dependencies".to_string())))
}

/// Install backend prerequisites and the backend itself, skipping any
/// command already on PATH.
pub fn install_backend(runner: &mut dyn Runner, settings: &Settings) -> Result<()> {
    let tools = settings
        .backend_prerequisites
        .iter()
        .chain(std::iter::once(&settings.backend_command));

    for tool in tools {
        if runner.command_exists(tool) {
            info!(stage = "provision", tool = %tool, "already installed");
            continue;
        }

        info!(stage = "provision", tool = %tool, "installing");
        let install = Cmd::new(&settings.gem_command)
            .args(["install", tool.as_str(), "--no-document", "--quiet"]);
        runner
            .run(&install)
            .map_err(|err| err.context(Failure::Environment(format!("installing {tool}"))))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::process::testing::RecordingRunner;

    fn ruby32() -> RuntimeVersion {
        RuntimeVersion {
            major: 3,
            minor: 2,
            patch: Some(1),
        }
    }

    #[test]
    fn test_build_packages_order_and_dedup() {
        let settings = Settings::default();
        let deps = vec!["libpq-dev".to_string(), "git-core".to_string()];

        let packages = build_packages(&settings, &deps, &ruby32());

        assert_eq!(
            packages,
            vec![
                "libpq-dev",
                "git-core",
                "ruby3.2-dev",
                "bundler",
                "build-essential"
            ]
        );
    }

    #[test]
    fn test_install_packages_refreshes_then_installs() {
        let mut runner = RecordingRunner::default();
        let packages = vec!["libpq-dev".to_string(), "ruby3.2-dev".to_string()];

        install_packages(&mut runner, &Settings::default(), &packages).unwrap();

        assert_eq!(
            runner.lines(),
            vec![
                "apt-get update -q",
                "apt-get install -y --no-install-recommends libpq-dev ruby3.2-dev"
            ]
        );
        assert!(runner.commands[0].envs().is_empty());
        assert_eq!(
            runner.commands[1].envs(),
            &[("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
        );
    }

    #[test]
    fn test_install_packages_update_failure_is_environment_error() {
        let mut runner = RecordingRunner::default().failing_on("update");

        let err = install_packages(&mut runner, &Settings::default(), &["git-core".to_string()])
            .unwrap_err();

        assert!(matches!(classify(&err), Some(Failure::Environment(_))));
        assert_eq!(runner.commands.len(), 1, "install must not run after failed update");
    }

    #[test]
    fn test_install_packages_install_failure() {
        let mut runner = RecordingRunner::default().failing_on("install -y");

        let err = install_packages(&mut runner, &Settings::default(), &["git-core".to_string()])
            .unwrap_err();

        assert!(err.to_string().contains("installing dependencies"));
    }

    #[test]
    fn test_install_backend_skips_present_tools() {
        let mut runner = RecordingRunner::default().with_installed("bundler");

        install_backend(&mut runner, &Settings::default()).unwrap();

        assert_eq!(
            runner.lines(),
            vec!["gem install fpm --no-document --quiet"]
        );
    }

    #[test]
    fn test_install_backend_idempotent_when_present() {
        let mut runner = RecordingRunner::default()
            .with_installed("bundler")
            .with_installed("fpm");

        install_backend(&mut runner, &Settings::default()).unwrap();

        assert!(runner.commands.is_empty());
    }

    #[test]
    fn test_provision_runs_all_steps() {
        let mut runner = RecordingRunner::default();

        provision(
            &mut runner,
            &Settings::default(),
            &["libpq-dev".to_string()],
            &ruby32(),
        )
        .unwrap();

        let lines = runner.lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("libpq-dev ruby3.2-dev bundler build-essential git-core"));
        assert_eq!(lines[2], "gem install bundler --no-document --quiet");
        assert_eq!(lines[3], "gem install fpm --no-document --quiet");
    }
}
