//! Fixed widths and packing limits shared across the engine.
//!
//! Block width, integer width, and the key hasher are all fixed at the
//! module level rather than left generic (see `DESIGN.md`).

/// Bit width of one storage block. Fixed to 64 so every status field,
/// however wide, fits in a single block and never straddles a boundary.
pub const BLOCK_BITS: u8 = 64;

/// Smallest legal width for an `Unsigned`/`Signed` field.
pub const MIN_FIELD_WIDTH: u8 = 2;

/// Largest legal width for any field, including `Float`.
pub const MAX_FIELD_WIDTH: u8 = BLOCK_BITS;

/// Width reserved for `Bool` fields.
pub const BOOL_WIDTH: u8 = 1;

/// Width of a `Float` field: `f64`'s bit representation.
pub const FLOAT_WIDTH: u8 = 64;

/// Multiplier applied to `f64::EPSILON` when deciding float equality and
/// round-trip exactness.
pub const EPSILON_MAGNITUDE: f64 = 4.0;

/// Largest bit position a field can start at. `StatusFormat` packs
/// `(kind, width)` into a signed 16-bit integer at persistence
/// boundaries (see `format.rs`); chunks stay below this so allocation
/// never produces a position the format can't encode.
pub const MAX_FIELD_POSITION: u32 = u16::MAX as u32;
