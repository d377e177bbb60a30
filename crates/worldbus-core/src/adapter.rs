//! Flat source/target/feedback buffers addressed through channel registries.

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use tracing::debug;

use crate::error::{AdapterError, ChannelError};
use crate::registry::ChannelRegistry;

/// Buffer role addressed by an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Target,
    Feedback,
}

#[derive(Debug, Default)]
struct ChannelValues {
    sources: Vec<f64>,
    targets: Vec<f64>,
    feedback: Vec<f64>,
}

impl ChannelValues {
    fn buffer(&self, role: Role) -> &[f64] {
        match role {
            Role::Source => &self.sources,
            Role::Target => &self.targets,
            Role::Feedback => &self.feedback,
        }
    }

    fn buffer_mut(&mut self, role: Role) -> &mut Vec<f64> {
        match role {
            Role::Source => &mut self.sources,
            Role::Target => &mut self.targets,
            Role::Feedback => &mut self.feedback,
        }
    }
}

/// Source, target and feedback buffers shared between an agent and its environment.
///
/// Registration happens through `&mut self` during the initialization phase and
/// ends with [`BufferedAdapter::seal`]. Every value access afterwards goes through
/// an internal mutex, either for a single call or for the lifetime of a
/// [`ChannelGuard`] obtained from [`BufferedAdapter::lock`]. Feedback shares the
/// target registry, one feedback slot per target slot.
#[derive(Debug, Default)]
pub struct BufferedAdapter {
    sources: ChannelRegistry,
    targets: ChannelRegistry,
    values: Mutex<ChannelValues>,
}

impl BufferedAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values_mut(&mut self) -> &mut ChannelValues {
        self.values.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a scalar source, returning its index.
    pub fn add_source(&mut self, name: &str, initial: f64) -> Result<usize, ChannelError> {
        let index = self.sources.register_scalar(name)?;
        self.values_mut().sources.push(initial);
        Ok(index)
    }

    /// Register a scalar target (and its feedback slot), returning its index.
    pub fn add_target(&mut self, name: &str, initial: f64) -> Result<usize, ChannelError> {
        let index = self.targets.register_scalar(name)?;
        let values = self.values_mut();
        values.targets.push(initial);
        values.feedback.push(initial);
        Ok(index)
    }

    /// Register a zero-filled source group.
    pub fn add_source_group(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> Result<Range<usize>, ChannelError> {
        let range = self.sources.register_group(name, shape)?;
        let values = self.values_mut();
        values.sources.resize(range.end, 0.0);
        Ok(range)
    }

    /// Register a source group seeded from `initial`, flattened row-major.
    pub fn add_source_group_with<S, D>(
        &mut self,
        name: &str,
        shape: &[usize],
        initial: &ArrayBase<S, D>,
    ) -> Result<Range<usize>, ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        check_initial(name, shape, initial.len())?;
        let range = self.sources.register_group(name, shape)?;
        self.values_mut().sources.extend(initial.iter().copied());
        Ok(range)
    }

    /// Register a zero-filled target group; its feedback slots start at zero.
    pub fn add_target_group(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> Result<Range<usize>, ChannelError> {
        let range = self.targets.register_group(name, shape)?;
        let values = self.values_mut();
        values.targets.resize(range.end, 0.0);
        values.feedback.resize(range.end, 0.0);
        Ok(range)
    }

    /// Register a target group seeded from `initial`; feedback slots start at zero.
    pub fn add_target_group_with<S, D>(
        &mut self,
        name: &str,
        shape: &[usize],
        initial: &ArrayBase<S, D>,
    ) -> Result<Range<usize>, ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        check_initial(name, shape, initial.len())?;
        let range = self.targets.register_group(name, shape)?;
        let values = self.values_mut();
        values.targets.extend(initial.iter().copied());
        values.feedback.resize(range.end, 0.0);
        Ok(range)
    }

    /// End the initialization phase for both registries.
    pub fn seal(&mut self) {
        if !self.is_sealed() {
            debug!(
                sources = self.sources.len(),
                targets = self.targets.len(),
                "sealing channel registries"
            );
        }
        self.sources.seal();
        self.targets.seal();
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sources.is_sealed() && self.targets.is_sealed()
    }

    #[must_use]
    pub fn source_registry(&self) -> &ChannelRegistry {
        &self.sources
    }

    #[must_use]
    pub fn target_registry(&self) -> &ChannelRegistry {
        &self.targets
    }

    /// Source names in registration order, aligned with [`Self::all_sources`].
    #[must_use]
    pub fn available_sources(&self) -> &[String] {
        self.sources.names()
    }

    /// Target names in registration order, aligned with [`Self::all_targets`].
    #[must_use]
    pub fn available_targets(&self) -> &[String] {
        self.targets.names()
    }

    /// Source names sorted lexicographically.
    #[must_use]
    pub fn sorted_sources(&self) -> Vec<String> {
        sorted(self.sources.names())
    }

    /// Target names sorted lexicographically.
    #[must_use]
    pub fn sorted_targets(&self) -> Vec<String> {
        sorted(self.targets.names())
    }

    #[must_use]
    pub fn source_groups(&self) -> &[String] {
        self.sources.group_names()
    }

    #[must_use]
    pub fn target_groups(&self) -> &[String] {
        self.targets.group_names()
    }

    pub fn source_index(&self, name: &str) -> Result<usize, ChannelError> {
        self.sources.index_of(name)
    }

    pub fn target_index(&self, name: &str) -> Result<usize, ChannelError> {
        self.targets.index_of(name)
    }

    /// Hold the buffer lock for a batch of accesses.
    pub fn lock(&self) -> ChannelGuard<'_> {
        ChannelGuard {
            sources: &self.sources,
            targets: &self.targets,
            values: self.values.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn get_source(&self, name: &str) -> Result<f64, ChannelError> {
        self.lock().get_source(name)
    }

    pub fn get_target(&self, name: &str) -> Result<f64, ChannelError> {
        self.lock().get_target(name)
    }

    pub fn get_feedback(&self, name: &str) -> Result<f64, ChannelError> {
        self.lock().get_feedback(name)
    }

    pub fn set_source(&self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.lock().set_source(name, value)
    }

    pub fn set_target(&self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.lock().set_target(name, value)
    }

    pub fn add_to_target(&self, name: &str, delta: f64) -> Result<(), ChannelError> {
        self.lock().add_to_target(name, delta)
    }

    pub fn set_feedback(&self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.lock().set_feedback(name, value)
    }

    pub fn get_source_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.lock().get_source_group(name, shape)
    }

    pub fn get_target_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.lock().get_target_group(name, shape)
    }

    pub fn get_feedback_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.lock().get_feedback_group(name, shape)
    }

    pub fn set_source_group<S, D>(
        &self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.lock().set_source_group(name, values)
    }

    pub fn set_target_group<S, D>(
        &self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.lock().set_target_group(name, values)
    }

    pub fn add_to_target_group<S, D>(
        &self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.lock().add_to_target_group(name, values)
    }

    pub fn set_feedback_group<S, D>(
        &self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.lock().set_feedback_group(name, values)
    }

    #[must_use]
    pub fn all_sources(&self) -> Vec<f64> {
        self.lock().sources().to_vec()
    }

    #[must_use]
    pub fn all_targets(&self) -> Vec<f64> {
        self.lock().targets().to_vec()
    }

    #[must_use]
    pub fn all_feedback(&self) -> Vec<f64> {
        self.lock().feedback().to_vec()
    }

    pub fn set_all_sources(&self, values: &[f64]) -> Result<(), ChannelError> {
        self.lock().set_all_sources(values)
    }

    pub fn set_all_targets(&self, values: &[f64]) -> Result<(), ChannelError> {
        self.lock().set_all_targets(values)
    }

    pub fn add_all_targets(&self, values: &[f64]) -> Result<(), ChannelError> {
        self.lock().add_all_targets(values)
    }

    pub fn set_all_feedback(&self, values: &[f64]) -> Result<(), ChannelError> {
        self.lock().set_all_feedback(values)
    }

    /// Zero the whole target buffer.
    pub fn reset_targets(&self) {
        self.lock().reset_targets();
    }
}

/// Exclusive access to an adapter's buffers, released on drop.
#[derive(Debug)]
pub struct ChannelGuard<'a> {
    sources: &'a ChannelRegistry,
    targets: &'a ChannelRegistry,
    values: MutexGuard<'a, ChannelValues>,
}

impl ChannelGuard<'_> {
    fn registry(&self, role: Role) -> &ChannelRegistry {
        match role {
            Role::Source => self.sources,
            Role::Target | Role::Feedback => self.targets,
        }
    }

    fn read(&self, role: Role, name: &str) -> Result<f64, ChannelError> {
        let index = self.registry(role).index_of(name)?;
        Ok(self.values.buffer(role)[index])
    }

    fn write(
        &mut self,
        role: Role,
        name: &str,
        value: f64,
        accumulate: bool,
    ) -> Result<(), ChannelError> {
        let index = self.registry(role).index_of(name)?;
        let slot = &mut self.values.buffer_mut(role)[index];
        if accumulate {
            *slot += value;
        } else {
            *slot = value;
        }
        Ok(())
    }

    fn read_group(
        &self,
        role: Role,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        let range = self.registry(role).group_range(name)?;
        let data = self.values.buffer(role)[range.clone()].to_vec();
        let shape = shape.map_or_else(|| vec![range.len()], <[usize]>::to_vec);
        let requested: usize = shape.iter().product();
        if requested != range.len() {
            return Err(ChannelError::ShapeMismatch {
                name: name.to_string(),
                expected: range.len(),
                actual: requested,
            });
        }
        ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| ChannelError::ShapeMismatch {
            name: name.to_string(),
            expected: range.len(),
            actual: requested,
        })
    }

    fn write_group<S, D>(
        &mut self,
        role: Role,
        name: &str,
        values: &ArrayBase<S, D>,
        accumulate: bool,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let range = self.registry(role).group_range(name)?;
        if values.len() != range.len() {
            return Err(ChannelError::ShapeMismatch {
                name: name.to_string(),
                expected: range.len(),
                actual: values.len(),
            });
        }
        let slice = &mut self.values.buffer_mut(role)[range];
        for (slot, value) in slice.iter_mut().zip(values.iter()) {
            if accumulate {
                *slot += *value;
            } else {
                *slot = *value;
            }
        }
        Ok(())
    }

    fn write_all(
        &mut self,
        role: Role,
        values: &[f64],
        accumulate: bool,
    ) -> Result<(), ChannelError> {
        let buffer = self.values.buffer_mut(role);
        if values.len() != buffer.len() {
            return Err(ChannelError::LengthMismatch {
                expected: buffer.len(),
                actual: values.len(),
            });
        }
        if accumulate {
            for (slot, value) in buffer.iter_mut().zip(values) {
                *slot += *value;
            }
        } else {
            buffer.copy_from_slice(values);
        }
        Ok(())
    }

    pub fn get_source(&self, name: &str) -> Result<f64, ChannelError> {
        self.read(Role::Source, name)
    }

    pub fn get_target(&self, name: &str) -> Result<f64, ChannelError> {
        self.read(Role::Target, name)
    }

    pub fn get_feedback(&self, name: &str) -> Result<f64, ChannelError> {
        self.read(Role::Feedback, name)
    }

    pub fn set_source(&mut self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.write(Role::Source, name, value, false)
    }

    pub fn set_target(&mut self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.write(Role::Target, name, value, false)
    }

    pub fn add_to_target(&mut self, name: &str, delta: f64) -> Result<(), ChannelError> {
        self.write(Role::Target, name, delta, true)
    }

    pub fn set_feedback(&mut self, name: &str, value: f64) -> Result<(), ChannelError> {
        self.write(Role::Feedback, name, value, false)
    }

    /// Slice of a source group, reshaped row-major when `shape` is given.
    pub fn get_source_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.read_group(Role::Source, name, shape)
    }

    pub fn get_target_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.read_group(Role::Target, name, shape)
    }

    pub fn get_feedback_group(
        &self,
        name: &str,
        shape: Option<&[usize]>,
    ) -> Result<ArrayD<f64>, ChannelError> {
        self.read_group(Role::Feedback, name, shape)
    }

    pub fn set_source_group<S, D>(
        &mut self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_group(Role::Source, name, values, false)
    }

    pub fn set_target_group<S, D>(
        &mut self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_group(Role::Target, name, values, false)
    }

    /// Accumulate `values` into a target group.
    pub fn add_to_target_group<S, D>(
        &mut self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_group(Role::Target, name, values, true)
    }

    pub fn set_feedback_group<S, D>(
        &mut self,
        name: &str,
        values: &ArrayBase<S, D>,
    ) -> Result<(), ChannelError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.write_group(Role::Feedback, name, values, false)
    }

    #[must_use]
    pub fn sources(&self) -> &[f64] {
        self.values.buffer(Role::Source)
    }

    #[must_use]
    pub fn targets(&self) -> &[f64] {
        self.values.buffer(Role::Target)
    }

    #[must_use]
    pub fn feedback(&self) -> &[f64] {
        self.values.buffer(Role::Feedback)
    }

    pub fn set_all_sources(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        self.write_all(Role::Source, values, false)
    }

    pub fn set_all_targets(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        self.write_all(Role::Target, values, false)
    }

    pub fn add_all_targets(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        self.write_all(Role::Target, values, true)
    }

    pub fn set_all_feedback(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        self.write_all(Role::Feedback, values, false)
    }

    pub fn reset_targets(&mut self) {
        self.values.targets.fill(0.0);
    }
}

fn check_initial(name: &str, shape: &[usize], supplied: usize) -> Result<(), ChannelError> {
    let expected: usize = shape.iter().product();
    if supplied != expected {
        return Err(ChannelError::ShapeMismatch {
            name: name.to_string(),
            expected,
            actual: supplied,
        });
    }
    Ok(())
}

fn sorted(names: &[String]) -> Vec<String> {
    let mut names = names.to_vec();
    names.sort();
    names
}

/// Binding between an environment and the buffers its agent reads and writes.
///
/// Implementors supply [`WorldAdapter::update_data_sources_and_targets`]; the
/// remaining hooks have defaults that most environments keep.
pub trait WorldAdapter: Send {
    /// Static identifier of the adapter implementation.
    fn kind(&self) -> &'static str;

    fn channels(&self) -> &BufferedAdapter;

    fn channels_mut(&mut self) -> &mut BufferedAdapter;

    /// Consume the current targets, act on the environment, then publish
    /// sources and feedback for the tick.
    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError>;

    /// Clear targets after a tick. Adapters whose targets persist across ticks
    /// override this with a no-op.
    fn reset_targets(&mut self) {
        self.channels().reset_targets();
    }

    /// Called after the simulation has been reset.
    fn initialize(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Called when the simulation is reset.
    fn reset_simulation_state(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Whether the host world should keep driving this adapter.
    fn is_alive(&self) -> bool {
        true
    }
}

impl<A: WorldAdapter + ?Sized> WorldAdapter for Box<A> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn channels(&self) -> &BufferedAdapter {
        (**self).channels()
    }

    fn channels_mut(&mut self) -> &mut BufferedAdapter {
        (**self).channels_mut()
    }

    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError> {
        (**self).update_data_sources_and_targets()
    }

    fn reset_targets(&mut self) {
        (**self).reset_targets();
    }

    fn initialize(&mut self) -> Result<(), AdapterError> {
        (**self).initialize()
    }

    fn reset_simulation_state(&mut self) -> Result<(), AdapterError> {
        (**self).reset_simulation_state()
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}
