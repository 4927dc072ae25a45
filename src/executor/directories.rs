//! Directory operation handlers.

use anyhow::{Context, Result};
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

/// Standard owner-rwx, group/other-rx directory mode.
pub const DIR_MODE: u32 = 0o755;

/// Create a directory (and missing parents) with `mode`.
///
/// An existing directory is left as is, permissions included.
pub fn handle_dirmode(path: &Path, mode: u32) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .with_context(|| format!("creating directory '{}'", path.display()))
}
