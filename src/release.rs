//! Release identifiers.
//!
//! A release id is the UTC build instant formatted as `YYYYMMDDHHMMSS`. It is
//! both the package version and the release directory name on the target.

use anyhow::{Context, Result};
use std::fmt;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::Failure;

const RELEASE_ID_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Generate the id for a build starting now.
    pub fn now() -> Result<Self> {
        Self::at(OffsetDateTime::now_utc())
    }

    pub fn at(instant: OffsetDateTime) -> Result<Self> {
        let format = format_description!("[year][month][day][hour][minute][second]");
        let formatted = instant
            .to_offset(time::UtcOffset::UTC)
            .format(format)
            .context("formatting release id")?;
        Self::parse(&formatted)
    }

    /// Accept a caller-supplied id, e.g. to rebuild a known release.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != RELEASE_ID_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Failure::Usage(format!(
                "release id must be {RELEASE_ID_LEN} digits (YYYYMMDDHHMMSS), got '{raw}'"
            ))
            .into());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the per-run build log.
    pub fn log_file_name(&self) -> String {
        format!("build-{}.log", self.0)
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
