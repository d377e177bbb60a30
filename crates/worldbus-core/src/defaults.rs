//! Example adapters that exercise the channel contract without a real environment.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde_json::{Map, Value};

use crate::adapter::{BufferedAdapter, WorldAdapter};
use crate::config::{AdapterConfig, ConfigOption};
use crate::error::AdapterError;
use crate::extension::{AdapterExtension, ExtensionStack};

const SEED_OPTION: &str = "rng_seed";

fn seed_option() -> ConfigOption {
    ConfigOption::new(SEED_OPTION, Value::Null)
        .describe("seed for sensor noise; null draws from entropy")
}

fn seeded_rng(config: &AdapterConfig) -> Result<SmallRng, AdapterError> {
    Ok(match config.get_opt_u64(SEED_OPTION)? {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::seed_from_u64(rand::random()),
    })
}

/// Scalar adapter with three static/random sources and an `echo` target.
#[derive(Debug)]
pub struct DefaultAdapter {
    channels: BufferedAdapter,
    config: AdapterConfig,
    rng: SmallRng,
}

impl DefaultAdapter {
    #[must_use]
    pub fn config_options() -> Vec<ConfigOption> {
        vec![seed_option()]
    }

    pub fn new(supplied: Map<String, Value>) -> Result<Self, AdapterError> {
        let config = AdapterConfig::resolve(&Self::config_options(), supplied);
        let rng = seeded_rng(&config)?;
        let mut channels = BufferedAdapter::new();
        for name in ["static_on", "random", "static_off"] {
            channels.add_source(name, 0.0)?;
        }
        channels.add_target("echo", 0.0)?;
        let mut adapter = Self {
            channels,
            config,
            rng,
        };
        adapter.update_data_sources_and_targets()?;
        Ok(adapter)
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

impl WorldAdapter for DefaultAdapter {
    fn kind(&self) -> &'static str {
        "default"
    }

    fn channels(&self) -> &BufferedAdapter {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut BufferedAdapter {
        &mut self.channels
    }

    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError> {
        let random = self.rng.random_range(0.0..1.0);
        let mut guard = self.channels.lock();
        let echo = guard.get_target("echo")?;
        if echo != 0.0 {
            guard.set_feedback("echo", echo)?;
        }
        guard.set_source("static_on", 1.0)?;
        guard.set_source("random", random)?;
        Ok(())
    }
}

/// Mirrors every target value into its feedback slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoFeedback;

impl AdapterExtension for EchoFeedback {
    fn name(&self) -> &'static str {
        "echo_feedback"
    }

    fn read_from_world(&mut self, channels: &BufferedAdapter) -> Result<(), AdapterError> {
        let mut guard = channels.lock();
        let targets = guard.targets().to_vec();
        guard.set_all_feedback(&targets)?;
        Ok(())
    }
}

/// Array adapter with a `vision (3, 7)` source group and an `action (2, 3)`
/// target group. Sources are refreshed with standard-normal noise; targets
/// persist across ticks.
#[derive(Debug)]
pub struct DefaultArrayAdapter {
    channels: BufferedAdapter,
    extensions: ExtensionStack,
    config: AdapterConfig,
    rng: SmallRng,
}

impl DefaultArrayAdapter {
    pub const VISION_SHAPE: [usize; 2] = [3, 7];
    pub const ACTION_SHAPE: [usize; 2] = [2, 3];

    #[must_use]
    pub fn config_options() -> Vec<ConfigOption> {
        vec![seed_option()]
    }

    pub fn new(supplied: Map<String, Value>) -> Result<Self, AdapterError> {
        let extensions = ExtensionStack::new().with(Box::new(EchoFeedback));
        let mut declared = Self::config_options();
        declared.extend(extensions.config_options());
        let config = AdapterConfig::resolve(&declared, supplied);
        let mut rng = seeded_rng(&config)?;

        let mut channels = BufferedAdapter::new();
        channels.add_source("test", 0.0)?;
        channels.add_source_group("vision", &Self::VISION_SHAPE)?;
        channels.add_target("test", 0.0)?;
        channels.add_target_group("action", &Self::ACTION_SHAPE)?;

        let noise: Vec<f64> = (0..channels.available_sources().len())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        channels.set_all_sources(&noise)?;

        Ok(Self {
            channels,
            extensions,
            config,
            rng,
        })
    }

    /// Append another extension; runs after the built-in feedback echo.
    pub fn push_extension(&mut self, extension: Box<dyn AdapterExtension>) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

impl WorldAdapter for DefaultArrayAdapter {
    fn kind(&self) -> &'static str {
        "default_array"
    }

    fn channels(&self) -> &BufferedAdapter {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut BufferedAdapter {
        &mut self.channels
    }

    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError> {
        self.extensions.write_to_world(&self.channels)?;
        let noise: Vec<f64> = (0..self.channels.available_sources().len())
            .map(|_| self.rng.sample(StandardNormal))
            .collect();
        self.channels.set_all_sources(&noise)?;
        self.extensions.read_from_world(&self.channels)
    }

    /// Targets are agent-owned state here and survive the tick.
    fn reset_targets(&mut self) {}

    fn initialize(&mut self) -> Result<(), AdapterError> {
        self.extensions.initialize(&self.channels)
    }

    fn reset_simulation_state(&mut self) -> Result<(), AdapterError> {
        self.channels.reset_targets();
        self.extensions.reset_simulation_state(&self.channels)
    }
}
