//! Build host toolchain settings.
//!
//! Defaults describe a Debian host building Ruby applications with fpm.
//! An optional TOML file overrides individual fields.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Language runtime queried with `<runtime_command> -v`.
    pub runtime_command: String,
    /// Prefix of the runtime's OS package names (`ruby3.2`, `ruby3.2-dev`).
    pub runtime_package_prefix: String,
    pub package_manager: String,
    /// Installer for the packaging backend and its prerequisites.
    pub gem_command: String,
    pub backend_command: String,
    /// Auxiliary build-time packages installed alongside `build_deps`.
    pub build_tools: Vec<String>,
    /// Tools installed through `gem_command` before the backend.
    pub backend_prerequisites: Vec<String>,
    /// Fixed runtime dependencies added to every package.
    pub extra_runtime_deps: Vec<String>,
    /// Interpreter for manifest instructions.
    pub shell: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime_command: "ruby".to_string(),
            runtime_package_prefix: "ruby".to_string(),
            package_manager: "apt-get".to_string(),
            gem_command: "gem".to_string(),
            backend_command: "fpm".to_string(),
            build_tools: vec![
                "bundler".to_string(),
                "build-essential".to_string(),
                "git-core".to_string(),
            ],
            backend_prerequisites: vec!["bundler".to_string()],
            extra_runtime_deps: vec!["bundler".to_string()],
            shell: "/bin/sh".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings '{}'", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing settings '{}'", path.display()))?;
        settings
            .check()
            .with_context(|| format!("invalid settings '{}'", path.display()))?;
        Ok(settings)
    }

    fn check(&self) -> Result<()> {
        for (field, value) in [
            ("runtime_command", &self.runtime_command),
            ("runtime_package_prefix", &self.runtime_package_prefix),
            ("package_manager", &self.package_manager),
            ("gem_command", &self.gem_command),
            ("backend_command", &self.backend_command),
            ("shell", &self.shell),
        ] {
            if value.trim().is_empty() {
                bail!("{field} must not be empty");
            }
        }
        Ok(())
    }
}
