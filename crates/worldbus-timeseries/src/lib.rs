//! Time-series playback for WorldBus.
//!
//! A [`Dataset`] is a 2-D table of ids by time offsets. [`TimeSeriesEngine`]
//! normalizes it once and hands out one column per step, optionally through
//! a permutation redrawn at the start of every pass. [`TimeSeriesWorld`]
//! drives attached adapters in lockstep with playback.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod world;

pub use config::TimeSeriesConfig;
pub use dataset::Dataset;
pub use engine::{PlaybackPhase, TimeSeriesEngine};
pub use error::TimeSeriesError;
pub use normalize::{Normalization, nan_moments, sigmoid, sigmoid_cutoff, sigmoid_guard};
pub use world::{AgentId, Playback, SharedPlayback, StepSummary, TimeSeriesRunner, TimeSeriesWorld};
