//! Working tree executor.
//!
//! Runs manifest build instructions inside the working tree and provides the
//! filesystem handlers the layout stage is built from.
//!
//! # Usage
//!
//! ```rust,ignore
//! use minecart::executor::run_instructions;
//!
//! run_instructions(&mut runner, "/bin/sh", &work_tree, &manifest.instructions)?;
//! ```

pub mod directories;
pub mod files;

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::process::{Cmd, Runner};

/// Run each instruction through `shell -c`, in order, with the working tree
/// as the current directory.
///
/// Instructions are trusted and run unsandboxed. The first non-zero exit
/// stops the run; later instructions may depend on earlier ones, so nothing
/// runs in parallel.
pub fn run_instructions(
    runner: &mut dyn Runner,
    shell: &str,
    work_tree: &Path,
    instructions: &[String],
) -> Result<()> {
    for (idx, instruction) in instructions.iter().enumerate() {
        info!(
            stage = "instructions",
            step = idx + 1,
            total = instructions.len(),
            "{instruction}"
        );
        let cmd = Cmd::shell(shell, instruction).current_dir(work_tree);
        runner.run(&cmd)?;
    }
    Ok(())
}
