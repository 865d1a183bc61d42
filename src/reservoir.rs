//! `Reservoir`: owns every [`StatusChunk`] and maps status keys to the
//! [`StatusProperty`] locating their field.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::chunk::StatusChunk;
use crate::error::ContractError;
use crate::format::{Format, Kind};
use crate::key::{Key, NO_KEY};
use crate::value::{AssignOp, ComparisonOp, StatusValue, Ternary};

/// The right-hand side of an assignment or comparison: either a literal
/// value or another status's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rhs {
    /// A literal value.
    Value(StatusValue),
    /// The current value of another status.
    Status(Key),
}

impl From<StatusValue> for Rhs {
    fn from(value: StatusValue) -> Self {
        Rhs::Value(value)
    }
}

/// `(target, op, rhs)` — one queued or immediate status write.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusAssignment {
    pub target: Key,
    pub op: AssignOp,
    pub rhs: Rhs,
}

impl StatusAssignment {
    /// Build an assignment from its three parts.
    pub const fn new(target: Key, op: AssignOp, rhs: Rhs) -> Self {
        Self { target, op, rhs }
    }
}

/// `(status, op, rhs)` — one `StatusComparison` expression element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusComparison {
    pub status: Key,
    pub op: ComparisonOp,
    pub rhs: Rhs,
}

impl StatusComparison {
    /// Build a comparison from its three parts.
    pub const fn new(status: Key, op: ComparisonOp, rhs: Rhs) -> Self {
        Self { status, op, rhs }
    }
}

/// Metadata locating and describing one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusProperty {
    chunk_key: Key,
    position: u32,
    format: Format,
}

impl StatusProperty {
    /// The chunk this status's field lives in.
    pub const fn chunk_key(&self) -> Key {
        self.chunk_key
    }

    /// The field's bit position inside its chunk.
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// The field's packed format.
    pub const fn format(&self) -> Format {
        self.format
    }
}

/// How many bits `format` actually occupies in storage. `Empty` still
/// reserves a one-bit field purely to have an address for its
/// transition flag (design supplement, `SPEC_FULL.md` §4).
fn storage_width(format: Format) -> u8 {
    match format.kind() {
        Kind::Empty => 1,
        _ => format.width(),
    }
}

/// Owns every [`StatusChunk`] and the status-key → [`StatusProperty`]
/// directory.
#[derive(Debug, Default)]
pub struct Reservoir {
    chunks: HashMap<Key, StatusChunk>,
    properties: HashMap<Key, StatusProperty>,
}

impl Reservoir {
    /// An empty reservoir with capacity hints for its two directories.
    pub fn new(chunk_capacity: usize, status_capacity: usize) -> Self {
        Self {
            chunks: HashMap::with_capacity(chunk_capacity),
            properties: HashMap::with_capacity(status_capacity),
        }
    }

    /// Register a new status in `chunk_key`, creating the chunk if it
    /// doesn't exist yet. `width` is required for `Unsigned`/`Signed`
    /// values; ignored (and implied) for `Bool`/`Float`/`Empty`.
    ///
    /// Fails if either key is [`NO_KEY`], `status_key` already exists,
    /// the width is out of range for the value's kind, or the initial
    /// value doesn't fit the declared width.
    pub fn register_status(&mut self, chunk_key: Key, status_key: Key, value: StatusValue, width: Option<u8>) -> bool {
        self.try_register_status(chunk_key, status_key, value, width).is_ok()
    }

    /// [`Reservoir::register_status`], reporting why it failed.
    pub fn try_register_status(
        &mut self,
        chunk_key: Key,
        status_key: Key,
        value: StatusValue,
        width: Option<u8>,
    ) -> Result<(), ContractError> {
        if chunk_key == NO_KEY || status_key == NO_KEY {
            return Err(ContractError::ReservedKey);
        }
        if self.properties.contains_key(&status_key) {
            return Err(ContractError::DuplicateKey);
        }

        let format = Self::resolve_format(&value, width).ok_or(ContractError::InvalidWidth)?;
        let coerced = value.coerce(format).map_err(|_| ContractError::InvalidWidth)?;

        let chunk = self.chunks.entry(chunk_key).or_default();
        let width_bits = storage_width(format);
        let position = chunk.allocate_field(width_bits)?;
        chunk.set_field(position, width_bits, coerced.to_bits(format.width()))?;
        chunk.set_transition_bit(position);

        self.properties.insert(
            status_key,
            StatusProperty {
                chunk_key,
                position,
                format,
            },
        );
        tracing::debug!(status = status_key, chunk = chunk_key, "registered status");
        Ok(())
    }

    fn resolve_format(value: &StatusValue, width: Option<u8>) -> Option<Format> {
        match (value.kind(), width) {
            (Kind::Empty, None | Some(0)) => Some(Format::EMPTY),
            (Kind::Bool, None) => Some(Format::BOOL),
            (Kind::Bool, Some(1)) => Some(Format::BOOL),
            (Kind::Float, None) => Some(Format::FLOAT),
            (Kind::Float, Some(w)) if w == Format::FLOAT.width() => Some(Format::FLOAT),
            (Kind::Unsigned, Some(w)) => Format::unsigned(w),
            (Kind::Signed, Some(w)) => Format::signed(w),
            _ => None,
        }
    }

    /// The current value of `status_key`, or `Empty` if it isn't
    /// registered.
    pub fn find_status(&self, status_key: Key) -> StatusValue {
        match self.properties.get(&status_key) {
            Some(property) => self.read_property(property),
            None => StatusValue::Empty,
        }
    }

    fn read_property(&self, property: &StatusProperty) -> StatusValue {
        if property.format.kind() == Kind::Empty {
            return StatusValue::Empty;
        }
        let chunk = &self.chunks[&property.chunk_key];
        let bits = chunk.get_field(property.position, property.format.width());
        StatusValue::from_bits(property.format, bits)
    }

    fn resolve_rhs(&self, rhs: &Rhs) -> Option<StatusValue> {
        match rhs {
            Rhs::Value(v) => Some(*v),
            Rhs::Status(key) => self.properties.get(key).map(|p| self.read_property(p)),
        }
    }

    /// Apply `assignment`, updating the target's transition flag if the
    /// write actually changed bits.
    ///
    /// Fails if the target is absent, the rhs status (if any) is
    /// absent, the operator is undefined for the target's kind, or the
    /// result doesn't fit the target's declared width.
    pub fn assign_status(&mut self, assignment: &StatusAssignment) -> bool {
        let property = match self.properties.get(&assignment.target) {
            Some(p) => *p,
            None => return false,
        };

        let rhs_value = match self.resolve_rhs(&assignment.rhs) {
            Some(v) => v,
            None => return false,
        };

        let current = self.read_property(&property);
        let combined = match current.assign(assignment.op, &rhs_value) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let coerced = match combined.coerce(property.format) {
            Ok(v) => v,
            Err(_) => return false,
        };

        if property.format.kind() == Kind::Empty {
            return true;
        }

        let chunk = self.chunks.get_mut(&property.chunk_key).expect("property outlived its chunk");
        match chunk.set_field(property.position, property.format.width(), coerced.to_bits(property.format.width())) {
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Evaluate a [`StatusComparison`].
    /// Returns [`Ternary::Unknown`] if either side can't be resolved.
    pub fn compare_status(&self, comparison: &StatusComparison) -> Ternary {
        let left = match self.properties.get(&comparison.status) {
            Some(p) => self.read_property(p),
            None => return Ternary::Unknown,
        };
        let right = match self.resolve_rhs(&comparison.rhs) {
            Some(v) => v,
            None => return Ternary::Unknown,
        };
        left.compare(comparison.op, &right)
    }

    /// The transition flag for `status_key`, used by `Evaluator`'s
    /// `StatusTransition` element. `Unknown` if absent.
    pub fn find_transition(&self, status_key: Key) -> Ternary {
        match self.properties.get(&status_key) {
            Some(p) => Ternary::from_bool(self.chunks[&p.chunk_key].transition(p.position)),
            None => Ternary::Unknown,
        }
    }

    /// Clear every transition flag in every chunk. Called exactly once
    /// per tick, after the dispatcher has scanned this tick's
    /// transitions.
    pub fn clear_transitions(&mut self) {
        for chunk in self.chunks.values_mut() {
            chunk.clear_transitions();
        }
    }

    /// Remove a chunk and every status it owns.
    pub fn remove_chunk(&mut self, chunk_key: Key) -> bool {
        if self.chunks.remove(&chunk_key).is_none() {
            return false;
        }
        self.properties.retain(|_, p| p.chunk_key != chunk_key);
        true
    }

    /// `true` if `status_key` is registered.
    pub fn contains_status(&self, status_key: Key) -> bool {
        self.properties.contains_key(&status_key)
    }

    /// This status's [`StatusProperty`], if registered.
    pub fn property(&self, status_key: Key) -> Option<StatusProperty> {
        self.properties.get(&status_key).copied()
    }

    /// Compact every chunk: within each chunk, fields are reallocated
    /// in descending-width order (widest fields placed first), values
    /// and transition flags are carried over exactly, and chunks left
    /// with no statuses are dropped.
    pub fn rebuild(&mut self, chunk_capacity: usize, status_capacity: usize) {
        self.chunks.reserve(chunk_capacity);
        self.properties.reserve(status_capacity);
        let by_chunk: HashMap<Key, Vec<Key>> = self
            .properties
            .iter()
            .map(|(status_key, property)| (property.chunk_key, *status_key))
            .into_group_map();

        let referenced: HashSet<Key> = by_chunk.keys().copied().collect();
        self.chunks.retain(|k, _| referenced.contains(k));

        for (chunk_key, status_keys) in by_chunk {
            let mut entries: Vec<(Key, Format, StatusValue, bool)> = status_keys
                .into_iter()
                .map(|status_key| {
                    let property = self.properties[&status_key];
                    let value = self.read_property(&property);
                    let transition = self.chunks[&property.chunk_key].transition(property.position);
                    (status_key, property.format, value, transition)
                })
                .collect();
            entries.sort_by(|a, b| storage_width(b.1).cmp(&storage_width(a.1)));

            let mut fresh = StatusChunk::new();
            for (status_key, format, value, transition) in entries {
                let width = storage_width(format);
                let position = fresh.allocate_field(width).expect("rebuild allocation cannot fail: widths already validated");
                fresh
                    .set_field(position, width, value.to_bits(format.width()))
                    .expect("rebuild write cannot fail: value already fits its own format");
                if transition {
                    fresh.set_transition_bit(position);
                } else {
                    fresh.clear_transition_bit(position);
                }
                self.properties.insert(status_key, StatusProperty { chunk_key, position, format });
            }
            self.chunks.insert(chunk_key, fresh);
        }
        tracing::debug!(chunks = self.chunks.len(), statuses = self.properties.len(), "reservoir rebuilt");
    }

    /// Number of registered statuses, mostly for tests and diagnostics.
    pub fn status_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of chunks currently owned.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(feature = "serde")]
impl Reservoir {
    /// Serialize one chunk's packed bytes. The wire format is a crate
    /// implementation detail, not a stability promise.
    pub fn serialize_chunk(&self, chunk_key: Key) -> Option<serde_json::Result<Vec<u8>>> {
        self.chunks.get(&chunk_key).map(serde_json::to_vec)
    }

    /// Replace `chunk_key`'s chunk with bytes from [`Reservoir::serialize_chunk`].
    /// Does not touch `properties`; callers are responsible for keeping the
    /// chunk's format/position directory consistent with what they saved.
    pub fn deserialize_chunk(&mut self, chunk_key: Key, bytes: &[u8]) -> serde_json::Result<()> {
        let chunk: StatusChunk = serde_json::from_slice(bytes)?;
        self.chunks.insert(chunk_key, chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_find_and_assign_round_trip() {
        let mut reservoir = Reservoir::new(4, 16);
        assert!(reservoir.register_status(1, 10, StatusValue::Bool(false), None));
        assert_eq!(reservoir.find_status(10), StatusValue::Bool(false));
        assert_eq!(reservoir.find_transition(10), Ternary::True);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reservoir = Reservoir::new(4, 16);
        assert!(reservoir.register_status(1, 10, StatusValue::Bool(true), None));
        assert!(!reservoir.register_status(1, 10, StatusValue::Bool(true), None));
    }

    #[test]
    fn registration_enforces_declared_width() {
        let mut reservoir = Reservoir::new(4, 16);
        // 130 doesn't fit 7 bits (max 127).
        assert!(!reservoir.register_status(1, 20, StatusValue::Unsigned(130), Some(7)));
        assert_eq!(reservoir.find_status(20), StatusValue::Empty);
    }

    #[test]
    fn assign_with_overflowing_width_fails_and_leaves_value_unchanged() {
        let mut reservoir = Reservoir::new(4, 16);
        assert!(reservoir.register_status(1, 30, StatusValue::Unsigned(10), Some(5)));
        assert!(reservoir.assign_status(&StatusAssignment::new(
            30,
            AssignOp::Add,
            Rhs::Value(StatusValue::Unsigned(5))
        )));
        assert_eq!(reservoir.find_status(30), StatusValue::Unsigned(15));
        assert!(!reservoir.assign_status(&StatusAssignment::new(
            30,
            AssignOp::Add,
            Rhs::Value(StatusValue::Unsigned(20))
        )));
        assert_eq!(reservoir.find_status(30), StatusValue::Unsigned(15));
    }

    #[test]
    fn remove_chunk_drops_every_status_it_owns() {
        let mut reservoir = Reservoir::new(4, 16);
        reservoir.register_status(1, 10, StatusValue::Bool(true), None);
        reservoir.register_status(1, 11, StatusValue::Unsigned(5), Some(8));
        reservoir.register_status(2, 12, StatusValue::Bool(true), None);
        assert!(reservoir.remove_chunk(1));
        assert_eq!(reservoir.find_status(10), StatusValue::Empty);
        assert_eq!(reservoir.find_status(11), StatusValue::Empty);
        assert_eq!(reservoir.find_status(12), StatusValue::Bool(true));
    }

    #[test]
    fn rebuild_preserves_values_and_transitions() {
        let mut reservoir = Reservoir::new(4, 16);
        reservoir.register_status(1, 10, StatusValue::Unsigned(3), Some(4));
        reservoir.register_status(1, 11, StatusValue::Unsigned(60000), Some(20));
        reservoir.clear_transitions();
        reservoir.assign_status(&StatusAssignment::new(
            10,
            AssignOp::Copy,
            Rhs::Value(StatusValue::Unsigned(9)),
        ));

        reservoir.rebuild(4, 16);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(9));
        assert_eq!(reservoir.find_status(11), StatusValue::Unsigned(60000));
        assert_eq!(reservoir.find_transition(10), Ternary::True);
        assert_eq!(reservoir.find_transition(11), Ternary::False);
    }

    #[test]
    fn idempotent_assign_does_not_retrigger_transition_after_clear() {
        let mut reservoir = Reservoir::new(4, 16);
        reservoir.register_status(1, 10, StatusValue::Bool(true), None);
        reservoir.clear_transitions();
        let current = reservoir.find_status(10);
        assert!(reservoir.assign_status(&StatusAssignment::new(10, AssignOp::Copy, Rhs::Value(current))));
        assert_eq!(reservoir.find_transition(10), Ternary::False);
    }
}
