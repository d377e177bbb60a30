//! Bounded, optionally shuffled playback over a normalized dataset.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::TimeSeriesConfig;
use crate::dataset::Dataset;
use crate::error::TimeSeriesError;

/// Playback phase. There is no terminal state; playback wraps forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Loaded,
    Playing,
}

/// Turns a dataset into one observation vector (one value per id) per step.
///
/// Step `s` maps to column `(s - 1) mod len`. With shuffling enabled the
/// column is looked up through a permutation that is redrawn every time the
/// step wraps back to column zero.
#[derive(Debug)]
pub struct TimeSeriesEngine {
    dataset: Dataset,
    shuffle: bool,
    permutation: Vec<usize>,
    rng: SmallRng,
    phase: PlaybackPhase,
    last_index: Option<usize>,
}

impl TimeSeriesEngine {
    /// Normalize `dataset` once according to `config` and prepare playback.
    pub fn load(mut dataset: Dataset, config: &TimeSeriesConfig) -> Result<Self, TimeSeriesError> {
        config.normalization.apply(&mut dataset)?;
        let mut rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        };
        let mut permutation: Vec<usize> = (0..dataset.columns()).collect();
        if config.shuffle {
            permutation.shuffle(&mut rng);
        }
        info!(
            ids = dataset.rows(),
            length = dataset.columns(),
            shuffle = config.shuffle,
            normalization = ?config.normalization,
            "time series ready for playback"
        );
        Ok(Self {
            dataset,
            shuffle: config.shuffle,
            permutation,
            rng,
            phase: PlaybackPhase::Loaded,
            last_index: None,
        })
    }

    /// Observation for `step`: the dataset column selected by the playback rules.
    pub fn advance(&mut self, step: u64) -> Vec<f64> {
        let t = self.position(step);
        if self.shuffle && t == 0 {
            self.permutation.shuffle(&mut self.rng);
            debug!(step, "redrew playback permutation");
        }
        let index = if self.shuffle { self.permutation[t] } else { t };
        self.phase = PlaybackPhase::Playing;
        self.last_index = Some(index);
        self.dataset.column(index)
    }

    /// Unpermuted position of `step` inside one pass, `(step - 1) mod len`.
    #[must_use]
    pub fn position(&self, step: u64) -> usize {
        let len = self.len() as u64;
        ((step % len + len - 1) % len) as usize
    }

    /// Number of time offsets in one pass.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.columns()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        self.dataset.ids()
    }

    /// The normalized dataset backing playback.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[must_use]
    pub const fn shuffle(&self) -> bool {
        self.shuffle
    }

    #[must_use]
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    #[must_use]
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Dataset column returned by the most recent [`Self::advance`].
    #[must_use]
    pub const fn last_index(&self) -> Option<usize> {
        self.last_index
    }
}
