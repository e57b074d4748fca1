//! # mzingest
//!
//! Command-line front end for importing raw mass spectrometry files.
//!
//! ```bash
//! # Which format is this?
//! mzingest detect run01.mzXML
//!
//! # Import and summarise
//! mzingest -v info run01.mzML --preload no-preload
//!
//! # List MS2 scan headers
//! mzingest scans run01.mzML --level 2 --limit 20
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
