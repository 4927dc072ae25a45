//! Language runtime detection.
//!
//! The build host's runtime version decides two package names: the
//! development headers needed to compile native extensions, and the runtime
//! package the produced artifact depends on.

use anyhow::Result;
use std::fmt;

use crate::error::Failure;
use crate::process::{Cmd, Runner};
use crate::settings::Settings;

/// `major.minor[.patch]` as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl RuntimeVersion {
    /// Pull the first dotted version out of free-form `-v` output, e.g.
    /// `ruby 3.2.1p31 (2023-02-08 revision 31819e82c8) [x86_64-linux]`.
    pub fn parse(output: &str) -> Option<Self> {
        output
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find_map(|token| {
                let parts: Vec<&str> = token.trim_matches('.').split('.').collect();
                if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
                    return None;
                }
                Some(Self {
                    major: parts[0].parse().ok()?,
                    minor: parts[1].parse().ok()?,
                    patch: parts.get(2).and_then(|p| p.parse().ok()),
                })
            })
    }

    /// Debian ships every 1.9.x runtime under the `1.9.1` ABI name.
    fn is_legacy(&self) -> bool {
        self.major == 1 && self.minor == 9
    }

    /// Headers package, e.g. `ruby3.2-dev` or `ruby1.9.1-dev`.
    pub fn dev_package(&self, prefix: &str) -> String {
        if self.is_legacy() {
            return format!("{prefix}1.9.1-dev");
        }
        format!("{prefix}{}.{}-dev", self.major, self.minor)
    }

    /// Runtime package, e.g. `ruby3.2` or `ruby1.9.3`.
    pub fn runtime_package(&self, prefix: &str) -> String {
        match (self.is_legacy(), self.patch) {
            (true, Some(patch)) => format!("{prefix}1.9.{patch}"),
            _ => format!("{prefix}{}.{}", self.major, self.minor),
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        Ok(())
    }
}

/// Query the installed runtime's version.
///
/// A missing runtime is an environment failure.
pub fn detect_runtime(runner: &mut dyn Runner, settings: &Settings) -> Result<RuntimeVersion> {
    if !runner.command_exists(&settings.runtime_command) {
        return Err(Failure::Environment(format!("{} missing", settings.runtime_command)).into());
    }

    let output = runner
        .capture(&Cmd::new(&settings.runtime_command).arg("-v"))
        .map_err(|err| {
            err.context(Failure::Environment(format!(
                "querying {} version",
                settings.runtime_command
            )))
        })?;

    RuntimeVersion::parse(&output).ok_or_else(|| {
        Failure::Environment(format!(
            "could not find a version in `{} -v` output: {}",
            settings.runtime_command,
            output.trim()
        ))
        .into()
    })
}
