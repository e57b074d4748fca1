use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzingest::config::ImportConfig;
use mzingest::task::ImportTask;

use super::heading;

/// Import a file and print its summary
pub fn run(file: PathBuf, config: ImportConfig, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    info!("Preload policy: {:?}", config.preload);
    let task = ImportTask::new(&file, config);
    let raw = task
        .run()
        .with_context(|| format!("Failed to import {}", file.display()))?;
    let summary = raw.summary();

    if json {
        let text = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", text);
    } else {
        println!("{}", heading("Raw File Summary"));
        println!("================");
        print!("{}", summary);
    }
    Ok(())
}
