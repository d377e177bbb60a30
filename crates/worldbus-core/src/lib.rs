//! Core channel plumbing shared across the WorldBus workspace.
//!
//! An agent writes actuator values into named *targets* and reads sensor
//! values from named *sources*; the environment consumes targets and
//! republishes sources (plus per-target *feedback*) once per tick.
//! [`ChannelRegistry`] maps names and shaped groups onto flat buffer
//! positions, [`BufferedAdapter`] owns the buffers, and [`CycleOrchestrator`]
//! enforces the update-then-reset order of every tick.

pub mod adapter;
pub mod config;
pub mod cycle;
pub mod defaults;
pub mod error;
pub mod extension;
pub mod registry;

pub use adapter::{BufferedAdapter, ChannelGuard, WorldAdapter};
pub use config::{AdapterConfig, ConfigOption};
pub use cycle::{CycleOrchestrator, Tick, TickReport};
pub use defaults::{DefaultAdapter, DefaultArrayAdapter, EchoFeedback};
pub use error::{AdapterError, ChannelError, ConfigError};
pub use extension::{AdapterExtension, ExtensionStack};
pub use registry::{ChannelGroup, ChannelRegistry};
