//! World hosting time-series playback and the agents attached to it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use slotmap::{SlotMap, new_key_type};
use tracing::{info, warn};
use worldbus_core::{AdapterError, BufferedAdapter, CycleOrchestrator, WorldAdapter};

use crate::config::TimeSeriesConfig;
use crate::dataset::Dataset;
use crate::engine::TimeSeriesEngine;
use crate::error::TimeSeriesError;

new_key_type! {
    /// Stable handle for agents attached to a world.
    pub struct AgentId;
}

/// Playback cursor shared between the world and its runners.
#[derive(Debug)]
pub struct Playback {
    engine: TimeSeriesEngine,
    current_step: u64,
    observation: Vec<f64>,
}

impl Playback {
    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Observation published for the current step.
    #[must_use]
    pub fn observation(&self) -> &[f64] {
        &self.observation
    }

    #[must_use]
    pub fn engine(&self) -> &TimeSeriesEngine {
        &self.engine
    }
}

pub type SharedPlayback = Arc<RwLock<Playback>>;

fn read(playback: &SharedPlayback) -> RwLockReadGuard<'_, Playback> {
    playback.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(playback: &SharedPlayback) -> RwLockWriteGuard<'_, Playback> {
    playback.write().unwrap_or_else(PoisonError::into_inner)
}

/// Summary emitted after each world step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub step: u64,
    pub ticked: usize,
    pub removed: usize,
}

/// A world whose environment is an ordered sequence of observation vectors.
pub struct TimeSeriesWorld {
    playback: SharedPlayback,
    agents: SlotMap<AgentId, CycleOrchestrator>,
}

impl fmt::Debug for TimeSeriesWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let playback = read(&self.playback);
        f.debug_struct("TimeSeriesWorld")
            .field("current_step", &playback.current_step)
            .field("length", &playback.engine.len())
            .field("agent_count", &self.agents.len())
            .finish()
    }
}

impl TimeSeriesWorld {
    #[must_use]
    pub fn new(engine: TimeSeriesEngine) -> Self {
        let observation = vec![0.0; engine.ids().len()];
        Self {
            playback: Arc::new(RwLock::new(Playback {
                engine,
                current_step: 0,
                observation,
            })),
            agents: SlotMap::with_key(),
        }
    }

    /// Load the configured archive, normalize it and build the world.
    pub fn from_config(config: &TimeSeriesConfig) -> Result<Self, TimeSeriesError> {
        config.validate()?;
        let dataset = Dataset::from_path(config.dataset_path()?)?;
        Ok(Self::new(TimeSeriesEngine::load(dataset, config)?))
    }

    /// Attach a [`TimeSeriesRunner`] reading this world's playback.
    pub fn spawn_runner(&mut self) -> Result<AgentId, TimeSeriesError> {
        let runner = TimeSeriesRunner::new(Arc::clone(&self.playback))?;
        Ok(self.attach(Box::new(runner)))
    }

    /// Attach any adapter; it is ticked once per world step.
    pub fn attach(&mut self, adapter: Box<dyn WorldAdapter>) -> AgentId {
        let kind = adapter.kind();
        let id = self.agents.insert(CycleOrchestrator::boxed(adapter));
        info!(?id, kind, "attached agent");
        id
    }

    pub fn remove(&mut self, id: AgentId) -> Option<CycleOrchestrator> {
        self.agents.remove(id)
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&CycleOrchestrator> {
        self.agents.get(id)
    }

    #[must_use]
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut CycleOrchestrator> {
        self.agents.get_mut(id)
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Advance playback by one step, then tick every attached agent once.
    /// Agents reporting `is_alive() == false` afterwards are dropped.
    ///
    /// A failing agent does not stop the others from ticking. The first
    /// failure is returned once every agent has been ticked and dead agents
    /// have been removed.
    pub fn step(&mut self) -> Result<StepSummary, AdapterError> {
        let step = {
            let mut playback = write(&self.playback);
            playback.current_step += 1;
            let step = playback.current_step;
            let observation = playback.engine.advance(step);
            playback.observation = observation;
            step
        };

        let mut dead = Vec::new();
        let mut failure = None;
        for (id, agent) in &mut self.agents {
            match agent.tick() {
                Ok(report) if !report.alive => dead.push(id),
                Ok(_) => {}
                Err(err) => {
                    let kind = agent.adapter().kind();
                    warn!(?id, kind, step, error = %err, "agent tick failed");
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }
        let ticked = self.agents.len();
        for id in &dead {
            if let Some(agent) = self.agents.remove(*id) {
                warn!(?id, kind = agent.adapter().kind(), step, "removing dead agent");
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(StepSummary {
            step,
            ticked,
            removed: dead.len(),
        })
    }

    #[must_use]
    pub fn current_step(&self) -> u64 {
        read(&self.playback).current_step
    }

    /// Observation for the current step.
    #[must_use]
    pub fn state(&self) -> Vec<f64> {
        read(&self.playback).observation.clone()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        read(&self.playback).engine.ids().to_vec()
    }

    /// Handle to the shared playback cursor.
    #[must_use]
    pub fn playback(&self) -> SharedPlayback {
        Arc::clone(&self.playback)
    }
}

/// Adapter exposing one source per dataset id, refreshed every tick.
#[derive(Debug)]
pub struct TimeSeriesRunner {
    channels: BufferedAdapter,
    playback: SharedPlayback,
}

impl TimeSeriesRunner {
    pub fn new(playback: SharedPlayback) -> Result<Self, TimeSeriesError> {
        let mut channels = BufferedAdapter::new();
        {
            let playback = read(&playback);
            for id in playback.engine.ids() {
                channels.add_source(id, 0.0).map_err(AdapterError::from)?;
            }
        }
        Ok(Self { channels, playback })
    }
}

impl WorldAdapter for TimeSeriesRunner {
    fn kind(&self) -> &'static str {
        "timeseries_runner"
    }

    fn channels(&self) -> &BufferedAdapter {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut BufferedAdapter {
        &mut self.channels
    }

    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError> {
        let playback = read(&self.playback);
        self.channels.set_all_sources(&playback.observation)?;
        Ok(())
    }
}
