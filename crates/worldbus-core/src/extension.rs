//! Reusable, optional behavior that adapters compose explicitly.

use std::fmt;

use crate::adapter::BufferedAdapter;
use crate::config::ConfigOption;
use crate::error::AdapterError;

/// Capability shared across several adapters (a body, a sensor rig, a logger).
///
/// Every hook defaults to a no-op so an extension only implements the ones it
/// cares about.
pub trait AdapterExtension: Send {
    fn name(&self) -> &'static str;

    /// Options this extension needs in the adapter configuration.
    fn config_options(&self) -> Vec<ConfigOption> {
        Vec::new()
    }

    /// Called after a reset of the simulation.
    fn initialize(&mut self, _channels: &BufferedAdapter) -> Result<(), AdapterError> {
        Ok(())
    }

    fn reset_simulation_state(&mut self, _channels: &BufferedAdapter) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Push current targets out to the environment.
    fn write_to_world(&mut self, _channels: &BufferedAdapter) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Pull environment state into sources and feedback.
    fn read_from_world(&mut self, _channels: &BufferedAdapter) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Ordered list of extensions run hook-by-hook in insertion order.
#[derive(Default)]
pub struct ExtensionStack {
    extensions: Vec<Box<dyn AdapterExtension>>,
}

impl fmt::Debug for ExtensionStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.name()))
            .finish()
    }
}

impl ExtensionStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: Box<dyn AdapterExtension>) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub fn with(mut self, extension: Box<dyn AdapterExtension>) -> Self {
        self.push(extension);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Options declared by every extension, in stack order.
    #[must_use]
    pub fn config_options(&self) -> Vec<ConfigOption> {
        self.extensions
            .iter()
            .flat_map(|ext| ext.config_options())
            .collect()
    }

    pub fn initialize(&mut self, channels: &BufferedAdapter) -> Result<(), AdapterError> {
        self.extensions
            .iter_mut()
            .try_for_each(|ext| ext.initialize(channels))
    }

    pub fn reset_simulation_state(
        &mut self,
        channels: &BufferedAdapter,
    ) -> Result<(), AdapterError> {
        self.extensions
            .iter_mut()
            .try_for_each(|ext| ext.reset_simulation_state(channels))
    }

    pub fn write_to_world(&mut self, channels: &BufferedAdapter) -> Result<(), AdapterError> {
        self.extensions
            .iter_mut()
            .try_for_each(|ext| ext.write_to_world(channels))
    }

    pub fn read_from_world(&mut self, channels: &BufferedAdapter) -> Result<(), AdapterError> {
        self.extensions
            .iter_mut()
            .try_for_each(|ext| ext.read_from_world(channels))
    }
}
