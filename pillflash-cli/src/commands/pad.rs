//! Bootloader image padding command.
//!
//! The application image lives at a fixed flash offset, so a bootloader
//! binary must be grown to exactly that size with the erased-flash value
//! before the two are concatenated or flashed separately.

use anyhow::{Context, Result};
use console::style;
use pillflash::pad_to;
use std::fs;
use std::path::Path;

use crate::Cli;

/// Pad command implementation.
pub(crate) fn cmd_pad(cli: &Cli, file: &Path, size: usize, output: Option<&Path>) -> Result<()> {
    let mut data =
        fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let original = data.len();

    pad_to(&mut data, size)
        .with_context(|| format!("Cannot pad {} to {size} bytes", file.display()))?;

    let dest = output.unwrap_or(file);
    fs::write(dest, &data).with_context(|| format!("Failed to write {}", dest.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} Padded {} from {original} to {size} bytes ({})",
            style("✓").green(),
            file.display(),
            dest.display()
        );
    }

    Ok(())
}
