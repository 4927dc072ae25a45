//! SHA-256 checksum files for produced packages.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const CHECKSUM_SUFFIX: &str = ".sha256";

pub fn sha256_file(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `<artifact>.sha256` next to the artifact.
///
/// Uses the `sha256sum` line format with just the file name, so
/// `sha256sum -c` works from the artifact's directory.
pub fn write_checksum(artifact: &Path) -> Result<PathBuf> {
    let hash = sha256_file(artifact)?;
    let filename = artifact
        .file_name()
        .context("Could not get artifact filename")?
        .to_string_lossy();

    let mut checksum_path = artifact.as_os_str().to_os_string();
    checksum_path.push(CHECKSUM_SUFFIX);
    let checksum_path = PathBuf::from(checksum_path);

    fs::write(&checksum_path, format!("{hash}  {filename}\n"))
        .with_context(|| format!("writing checksum '{}'", checksum_path.display()))?;
    Ok(checksum_path)
}
