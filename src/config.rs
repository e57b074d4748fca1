//! Import configuration
//!
//! Defaults live in [`ImportConfig`]. A TOML file may override any of them:
//!
//! ```toml
//! # mzingest.toml
//! [import]
//! preload = "preload_all"
//! sniff_lines = 40
//! progress_interval = 500
//!
//! [import.window_sizes]
//! mzml = 32
//! mzxml = 16
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::{RawDataFormat, DEFAULT_SNIFF_LINES};

/// Errors raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    IoError {
        /// Offending path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Which scans keep their peak arrays in memory after import
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PreloadPolicy {
    /// Every scan lives in the storage backend only
    NoPreload,
    /// Every scan is kept resident
    PreloadAll,
    /// MS1 scans are kept resident, fragment scans stay on disk
    #[default]
    PreloadFullScansOnly,
}

impl PreloadPolicy {
    /// Whether scans of this MS level are held in memory
    pub fn keeps_resident(&self, ms_level: u8) -> bool {
        match self {
            PreloadPolicy::NoPreload => false,
            PreloadPolicy::PreloadAll => true,
            PreloadPolicy::PreloadFullScansOnly => ms_level <= 1,
        }
    }
}

/// Windowed builder capacity per input format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSizes {
    /// mzXML window
    pub mzxml: usize,
    /// mzData window
    pub mzdata: usize,
    /// mzML window
    pub mzml: usize,
    /// NetCDF window
    pub netcdf: usize,
}

impl Default for WindowSizes {
    fn default() -> Self {
        Self {
            mzxml: 10,
            mzdata: 10,
            mzml: 20,
            netcdf: 1,
        }
    }
}

impl WindowSizes {
    /// Capacity used for `format`
    pub fn for_format(&self, format: RawDataFormat) -> usize {
        match format {
            RawDataFormat::MzXml => self.mzxml,
            RawDataFormat::MzData => self.mzdata,
            RawDataFormat::MzMl => self.mzml,
            RawDataFormat::NetCdf => self.netcdf,
        }
    }
}

/// Settings for one import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportConfig {
    /// Windowed builder capacity per format
    pub window_sizes: WindowSizes,
    /// Which scans stay resident after import
    pub preload: PreloadPolicy,
    /// Lines inspected when sniffing an XML dialect
    pub sniff_lines: usize,
    /// Log progress every this many scans (0 disables)
    pub progress_interval: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            window_sizes: WindowSizes::default(),
            preload: PreloadPolicy::default(),
            sniff_lines: DEFAULT_SNIFF_LINES,
            progress_interval: 1000,
        }
    }
}

impl ImportConfig {
    /// Set the preload policy
    pub fn with_preload(mut self, preload: PreloadPolicy) -> Self {
        self.preload = preload;
        self
    }

    /// Set the window capacity for one format
    pub fn with_window_size(mut self, format: RawDataFormat, size: usize) -> Self {
        match format {
            RawDataFormat::MzXml => self.window_sizes.mzxml = size,
            RawDataFormat::MzData => self.window_sizes.mzdata = size,
            RawDataFormat::MzMl => self.window_sizes.mzml = size,
            RawDataFormat::NetCdf => self.window_sizes.netcdf = size,
        }
        self
    }

    /// Load a TOML file and apply it on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        ConfigFile::from_file(path)?.import.apply_to(&mut config)?;
        Ok(config)
    }
}

/// Root structure of an `mzingest.toml` file
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Import settings
    #[serde(default)]
    pub import: ImportSettings,
}

/// `[import]` table, every field optional
#[derive(Debug, Default, Deserialize)]
pub struct ImportSettings {
    /// Preload policy override
    pub preload: Option<PreloadPolicy>,
    /// Sniff line limit override
    pub sniff_lines: Option<usize>,
    /// Progress log interval override
    pub progress_interval: Option<usize>,
    /// Per-format window overrides
    #[serde(default)]
    pub window_sizes: WindowSettings,
}

/// `[import.window_sizes]` table
#[derive(Debug, Default, Deserialize)]
pub struct WindowSettings {
    /// mzXML window
    pub mzxml: Option<usize>,
    /// mzData window
    pub mzdata: Option<usize>,
    /// mzML window
    pub mzml: Option<usize>,
    /// NetCDF window
    pub netcdf: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

impl ImportSettings {
    /// Overwrite the fields of `config` that this table sets
    pub fn apply_to(&self, config: &mut ImportConfig) -> Result<(), ConfigError> {
        if let Some(preload) = self.preload {
            config.preload = preload;
        }
        if let Some(lines) = self.sniff_lines {
            if lines == 0 {
                return Err(ConfigError::InvalidValue(
                    "sniff_lines must be at least 1".to_string(),
                ));
            }
            config.sniff_lines = lines;
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = interval;
        }

        let windows = &self.window_sizes;
        for (value, slot) in [
            (windows.mzxml, &mut config.window_sizes.mzxml),
            (windows.mzdata, &mut config.window_sizes.mzdata),
            (windows.mzml, &mut config.window_sizes.mzml),
            (windows.netcdf, &mut config.window_sizes.netcdf),
        ] {
            if let Some(size) = value {
                if size == 0 {
                    return Err(ConfigError::InvalidValue(
                        "window sizes must be at least 1".to_string(),
                    ));
                }
                *slot = size;
            }
        }
        Ok(())
    }
}
