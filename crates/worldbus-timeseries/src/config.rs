//! Configuration for time-series worlds.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TimeSeriesError;
use crate::normalize::Normalization;

/// Static configuration for a time-series world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// JSON archive to play back.
    pub dataset: Option<PathBuf>,
    /// Randomize the order of presentation within each pass.
    pub shuffle: bool,
    /// Per-row normalization applied once at load.
    pub normalization: Normalization,
    /// Optional RNG seed for reproducible shuffling.
    pub rng_seed: Option<u64>,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            shuffle: true,
            normalization: Normalization::default(),
            rng_seed: None,
        }
    }
}

impl TimeSeriesConfig {
    /// Read a JSON configuration file; omitted fields keep their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TimeSeriesError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn validate(&self) -> Result<(), TimeSeriesError> {
        self.normalization.validate()
    }

    /// Configured archive path, required before a world can be built from disk.
    pub fn dataset_path(&self) -> Result<&Path, TimeSeriesError> {
        self.dataset
            .as_deref()
            .ok_or(TimeSeriesError::Configuration("no dataset path configured"))
    }
}
