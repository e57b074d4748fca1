use anyhow::{Context, Result};
use std::path::PathBuf;

use mzingest::detect::detect_format;

/// Print the detected format
pub fn run(file: PathBuf, sniff_lines: usize) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let format = detect_format(&file, sniff_lines)
        .with_context(|| format!("Failed to detect format of {}", file.display()))?;
    println!("{}: {}", file.display(), format);
    Ok(())
}
