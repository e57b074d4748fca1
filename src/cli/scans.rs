use anyhow::{Context, Result};
use std::path::PathBuf;

use mzingest::config::ImportConfig;
use mzingest::raw_file::StoredScan;
use mzingest::task::ImportTask;

use super::heading;

fn format_scan(scan: &StoredScan) -> String {
    let record = scan.record();
    let precursor = match (record.precursor_mz, record.parent_scan_number) {
        (Some(mz), Some(parent)) => format!("{:.4} (parent {})", mz, parent),
        (Some(mz), None) => format!("{:.4}", mz),
        (None, Some(parent)) => format!("parent {}", parent),
        (None, None) => "-".to_string(),
    };
    format!(
        "{:>7} {:>3} {:>10.3} {:>1} {:>8} {:>3} {}",
        scan.scan_number(),
        scan.ms_level(),
        scan.retention_time(),
        record.polarity,
        scan.point_count(),
        scan.fragment_scan_numbers().len(),
        precursor
    )
}

/// List scan headers
pub fn run(file: PathBuf, config: ImportConfig, level: Option<u8>, limit: Option<usize>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let raw = ImportTask::new(&file, config)
        .run()
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!(
        "{}",
        heading(&format!(
            "{:>7} {:>3} {:>10} {:>1} {:>8} {:>3} {}",
            "Scan", "MS", "RT (s)", "P", "Points", "Frg", "Precursor"
        ))
    );
    let selected = raw
        .scans()
        .filter(|scan| level.map_or(true, |l| scan.ms_level() == l))
        .take(limit.unwrap_or(usize::MAX));
    for scan in selected {
        println!("{}", format_scan(scan));
    }
    Ok(())
}
