//! Per-tick driver enforcing the update-then-reset contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::adapter::WorldAdapter;
use crate::error::AdapterError;

/// Number of completed exchange cycles.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub kind: &'static str,
    pub alive: bool,
}

/// Drives a single adapter one cycle at a time.
///
/// The caller owns the cadence; each [`CycleOrchestrator::tick`] runs the
/// adapter hook and the reset policy exactly once. The first tick seals the
/// adapter's registries.
pub struct CycleOrchestrator<A: WorldAdapter = Box<dyn WorldAdapter>> {
    adapter: A,
    tick: Tick,
}

impl<A: WorldAdapter> fmt::Debug for CycleOrchestrator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleOrchestrator")
            .field("kind", &self.adapter.kind())
            .field("tick", &self.tick)
            .finish()
    }
}

impl CycleOrchestrator {
    /// Wrap a type-erased adapter.
    #[must_use]
    pub fn boxed(adapter: Box<dyn WorldAdapter>) -> Self {
        Self::new(adapter)
    }
}

impl<A: WorldAdapter> CycleOrchestrator<A> {
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            tick: Tick::zero(),
        }
    }

    /// Run one exchange: environment update, then target reset.
    ///
    /// A failed update returns before the reset and leaves the tick count alone.
    pub fn tick(&mut self) -> Result<TickReport, AdapterError> {
        if !self.adapter.channels().is_sealed() {
            self.adapter.channels_mut().seal();
        }
        self.adapter.update_data_sources_and_targets()?;
        self.adapter.reset_targets();
        self.tick = self.tick.next();
        trace!(kind = self.adapter.kind(), tick = self.tick.0, "cycle complete");
        Ok(TickReport {
            tick: self.tick,
            kind: self.adapter.kind(),
            alive: self.adapter.is_alive(),
        })
    }

    /// Reset the simulation state of the adapter and re-run its initialization.
    pub fn reset(&mut self) -> Result<(), AdapterError> {
        debug!(kind = self.adapter.kind(), tick = self.tick.0, "resetting adapter");
        self.adapter.reset_simulation_state()?;
        self.adapter.initialize()?;
        self.tick = Tick::zero();
        Ok(())
    }

    #[must_use]
    pub const fn tick_count(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.adapter.is_alive()
    }

    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    #[must_use]
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Release the wrapped adapter.
    pub fn into_inner(self) -> A {
        self.adapter
    }
}
