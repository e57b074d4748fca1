use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mzingest::config::{ImportConfig, PreloadPolicy};

mod detect;
mod info;
mod scans;

/// mzingest - Streaming raw data import for mass spectrometry
#[derive(Parser)]
#[command(name = "mzingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected format of a raw data file
    Detect {
        /// Input file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Lines inspected when sniffing XML dialects
        #[arg(long, default_value_t = mzingest::detect::DEFAULT_SNIFF_LINES)]
        sniff_lines: usize,
    },

    /// Import a file and print a summary
    Info {
        /// Input file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Which scans keep their peaks in memory
        #[arg(short = 'p', long, value_enum)]
        preload: Option<PreloadPolicy>,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a file and list its scan headers
    Scans {
        /// Input file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Only list scans at this MS level
        #[arg(short = 'l', long)]
        level: Option<u8>,

        /// Stop after this many scans
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect { file, sniff_lines } => detect::run(file, sniff_lines),
        Commands::Info {
            file,
            config,
            preload,
            json,
        } => info::run(file, load_config(config.as_deref(), preload)?, json),
        Commands::Scans {
            file,
            config,
            level,
            limit,
        } => scans::run(file, load_config(config.as_deref(), None)?, level, limit),
    }
}

/// Defaults, then the config file, then command-line overrides
fn load_config(path: Option<&Path>, preload: Option<PreloadPolicy>) -> Result<ImportConfig> {
    let mut config = match path {
        Some(path) => ImportConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => ImportConfig::default(),
    };
    if let Some(preload) = preload {
        config = config.with_preload(preload);
    }
    Ok(config)
}

/// Section heading, styled when colours are available
fn heading(text: &str) -> String {
    #[cfg(feature = "colorized_output")]
    {
        console::style(text).bold().cyan().to_string()
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        text.to_string()
    }
}
