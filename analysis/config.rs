//! Run configuration.
//!
//! Every setting has a default, so a run needs neither a config file nor
//! command-line flags. A TOML file may override any subset of the defaults,
//! and command-line flags override the file.

use crate::data::LoadOptions;
use crate::segment::SegmentFilters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("The separator must be a single ASCII character, got '{0}'.")]
    InvalidSeparator(char),
    #[error("The round identifier must not be empty.")]
    EmptyRound,
    #[error("Filter bounds are inverted: {name} minimum {min} exceeds maximum {max}.")]
    InvalidFilters { name: &'static str, min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Delimited input file with one row per review record.
    pub input: PathBuf,
    /// Directory receiving the coefficient and metadata tables.
    pub output_dir: PathBuf,
    /// Identifier embedded in every output file name.
    pub round: String,
    pub separator: char,
    pub field_prefix: String,
    /// Field indicator left out of every model.
    pub reference_field: String,
    /// Keep fitting the remaining models after one fails.
    pub keep_going: bool,
    pub filters: SegmentFilters,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let load = LoadOptions::default();
        Self {
            input: PathBuf::from("df_regression.csv"),
            output_dir: PathBuf::from("regression_outputs"),
            round: "1".to_string(),
            separator: load.separator as char,
            field_prefix: load.field_prefix,
            reference_field: load.reference_field,
            keep_going: false,
            filters: SegmentFilters::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round.trim().is_empty() {
            return Err(ConfigError::EmptyRound);
        }
        if !self.separator.is_ascii() {
            return Err(ConfigError::InvalidSeparator(self.separator));
        }
        if self.filters.min_authors > self.filters.max_authors {
            return Err(ConfigError::InvalidFilters {
                name: "total_authors",
                min: self.filters.min_authors,
                max: self.filters.max_authors,
            });
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            separator: self.separator as u8,
            field_prefix: self.field_prefix.clone(),
            reference_field: self.reference_field.clone(),
        }
    }
}
