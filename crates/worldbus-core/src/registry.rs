//! Append-only mapping between channel names and flat buffer positions.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use tracing::debug;

use crate::error::ChannelError;

/// Contiguous run of channels registered under one name with an n-dimensional shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    range: Range<usize>,
    shape: Vec<usize>,
}

impl ChannelGroup {
    /// Flat buffer interval covered by the group.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Shape the group was registered with.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of member channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Name registry for a single buffer role (sources or targets).
///
/// Indices are handed out in registration order and never reused. Once the
/// registry is sealed every mutating call fails with
/// [`ChannelError::RegistrySealed`].
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    names: Vec<String>,
    index: HashMap<String, usize>,
    groups: HashMap<String, ChannelGroup>,
    group_order: Vec<String>,
    sealed: bool,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single named channel, returning its buffer index.
    pub fn register_scalar(&mut self, name: &str) -> Result<usize, ChannelError> {
        self.ensure_open(name)?;
        if self.contains(name) {
            return Err(ChannelError::DuplicateName {
                name: name.to_string(),
            });
        }
        let index = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), index);
        debug!(channel = name, index, "registered channel");
        Ok(index)
    }

    /// Register a shaped group, returning the flat range its members occupy.
    ///
    /// Member names are synthesized as `{name}_{i0}_{i1}_...` in row-major order.
    /// All names are checked before anything is appended.
    pub fn register_group(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> Result<Range<usize>, ChannelError> {
        self.ensure_open(name)?;
        if shape.is_empty() || shape.contains(&0) {
            return Err(ChannelError::InvalidShape {
                name: name.to_string(),
                shape: shape.to_vec(),
            });
        }
        if self.contains(name) {
            return Err(ChannelError::DuplicateName {
                name: name.to_string(),
            });
        }

        let members = member_names(name, shape);
        let mut fresh = HashSet::with_capacity(members.len());
        for member in &members {
            if self.index.contains_key(member)
                || self.groups.contains_key(member)
                || !fresh.insert(member.as_str())
            {
                return Err(ChannelError::DuplicateName {
                    name: member.clone(),
                });
            }
        }

        let start = self.names.len();
        for member in members {
            self.index.insert(member.clone(), self.names.len());
            self.names.push(member);
        }
        let range = start..self.names.len();
        self.groups.insert(
            name.to_string(),
            ChannelGroup {
                range: range.clone(),
                shape: shape.to_vec(),
            },
        );
        self.group_order.push(name.to_string());
        debug!(
            group = name,
            ?shape,
            start = range.start,
            end = range.end,
            "registered channel group"
        );
        Ok(range)
    }

    /// Resolve a scalar or group-member name to its buffer index.
    pub fn index_of(&self, name: &str) -> Result<usize, ChannelError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ChannelError::UnknownChannel {
                name: name.to_string(),
            })
    }

    /// All scalar and group-member names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Flat range of a registered group.
    pub fn group_range(&self, name: &str) -> Result<Range<usize>, ChannelError> {
        self.group(name).map(ChannelGroup::range)
    }

    pub fn group(&self, name: &str) -> Result<&ChannelGroup, ChannelError> {
        self.groups
            .get(name)
            .ok_or_else(|| ChannelError::UnknownGroup {
                name: name.to_string(),
            })
    }

    /// Group names in registration order.
    #[must_use]
    pub fn group_names(&self) -> &[String] {
        &self.group_order
    }

    /// Whether `name` is taken by a channel, a group member, or a group.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name) || self.groups.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// End the initialization phase.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_open(&self, name: &str) -> Result<(), ChannelError> {
        if self.sealed {
            return Err(ChannelError::RegistrySealed {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Unravel every flat offset of `shape` into a `{base}_{i0}_{i1}...` name.
fn member_names(base: &str, shape: &[usize]) -> Vec<String> {
    let size: usize = shape.iter().product();
    let mut coords = vec![0usize; shape.len()];
    let mut names = Vec::with_capacity(size);
    for _ in 0..size {
        let mut name = String::from(base);
        for coord in &coords {
            name.push('_');
            name.push_str(&coord.to_string());
        }
        names.push(name);

        for axis in (0..shape.len()).rev() {
            coords[axis] += 1;
            if coords[axis] < shape[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_get_sequential_indices() {
        let mut registry = ChannelRegistry::new();
        assert_eq!(registry.register_scalar("a").unwrap(), 0);
        assert_eq!(registry.register_scalar("b").unwrap(), 1);
        assert_eq!(registry.index_of("b").unwrap(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn group_members_unravel_row_major() {
        let mut registry = ChannelRegistry::new();
        registry.register_scalar("test").unwrap();
        let range = registry.register_group("vision", &[2, 3]).unwrap();
        assert_eq!(range, 1..7);
        assert_eq!(
            &registry.names()[1..],
            &[
                "vision_0_0",
                "vision_0_1",
                "vision_0_2",
                "vision_1_0",
                "vision_1_1",
                "vision_1_2"
            ]
        );
        assert_eq!(registry.index_of("vision_1_0").unwrap(), 4);
        assert_eq!(registry.group("vision").unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn one_dimensional_group_names() {
        let mut registry = ChannelRegistry::new();
        registry.register_group("x", &[3]).unwrap();
        assert_eq!(registry.names(), &["x_0", "x_1", "x_2"]);
    }

    #[test]
    fn duplicate_group_member_leaves_registry_untouched() {
        let mut registry = ChannelRegistry::new();
        registry.register_scalar("grid_1_1").unwrap();
        let err = registry.register_group("grid", &[2, 2]).unwrap_err();
        assert_eq!(
            err,
            ChannelError::DuplicateName {
                name: "grid_1_1".into()
            }
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.group_range("grid").is_err());
    }

    #[test]
    fn group_name_shares_scalar_namespace() {
        let mut registry = ChannelRegistry::new();
        registry.register_group("motor", &[2]).unwrap();
        assert!(matches!(
            registry.register_scalar("motor"),
            Err(ChannelError::DuplicateName { .. })
        ));
        assert!(matches!(
            registry.register_scalar("motor_1"),
            Err(ChannelError::DuplicateName { .. })
        ));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let mut registry = ChannelRegistry::new();
        assert!(matches!(
            registry.register_group("empty", &[3, 0]),
            Err(ChannelError::InvalidShape { .. })
        ));
        assert!(matches!(
            registry.register_group("scalarish", &[]),
            Err(ChannelError::InvalidShape { .. })
        ));
    }

    #[test]
    fn sealed_registry_rejects_growth() {
        let mut registry = ChannelRegistry::new();
        registry.register_scalar("a").unwrap();
        registry.seal();
        assert!(matches!(
            registry.register_scalar("b"),
            Err(ChannelError::RegistrySealed { .. })
        ));
        assert!(matches!(
            registry.register_group("g", &[1]),
            Err(ChannelError::RegistrySealed { .. })
        ));
        assert_eq!(registry.index_of("a").unwrap(), 0);
    }

    #[test]
    fn unknown_lookups_fail() {
        let registry = ChannelRegistry::new();
        assert!(matches!(
            registry.index_of("nope"),
            Err(ChannelError::UnknownChannel { .. })
        ));
        assert!(matches!(
            registry.group_range("nope"),
            Err(ChannelError::UnknownGroup { .. })
        ));
    }
}
