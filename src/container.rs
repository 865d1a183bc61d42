//! Small reusable containers: the chunk free-list and a tiny append-only
//! "static vector" shape used for expression element arrays.
//!
//! Design notes call for keeping the free list a sorted
//! vector with binary search rather than reaching for an interval tree —
//! `n` (free regions per chunk) stays small in practice.

/// One free region inside a [`crate::chunk::StatusChunk`]: `width` bits
/// starting at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreeField {
    pub width: u8,
    pub position: u32,
}

/// Free-field list ordered by `(width, position)` ascending, so the
/// first match for "width >= requested" is the best fit, tie-broken by
/// earliest position.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FreeList(Vec<FreeField>);

impl FreeList {
    /// An empty free list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of tracked free regions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no free regions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a free region, keeping `(width, position)` order.
    pub fn insert(&mut self, width: u8, position: u32) {
        let field = FreeField { width, position };
        let idx = self.0.partition_point(|f| *f < field);
        self.0.insert(idx, field);
    }

    /// Remove the smallest region with `width >= requested`, returning
    /// its position. Leaves the list sorted.
    pub fn take_best_fit(&mut self, requested: u8) -> Option<FreeField> {
        let idx = self.0.partition_point(|f| f.width < requested);
        if idx < self.0.len() {
            Some(self.0.remove(idx))
        } else {
            None
        }
    }

    /// Iterate free regions in `(width, position)` order.
    pub fn iter(&self) -> impl Iterator<Item = &FreeField> {
        self.0.iter()
    }

    /// Total bits tracked as free, for the occupancy invariant
    ///: `sum(field widths) + sum(free widths) == blocks * BLOCK_BITS`.
    pub fn total_width(&self) -> u64 {
        self.0.iter().map(|f| f.width as u64).sum()
    }

    /// Rebuild from scratch, largest width first, as `rebuild` does
    /// during compaction.
    pub fn rebuild_descending(fields: impl IntoIterator<Item = (u8, u32)>) -> Self {
        let mut entries: Vec<FreeField> = fields
            .into_iter()
            .map(|(width, position)| FreeField { width, position })
            .collect();
        entries.sort_by(|a, b| b.width.cmp(&a.width).then(a.position.cmp(&b.position)));
        let mut list = FreeList::new();
        for f in entries {
            list.insert(f.width, f.position);
        }
        list
    }
}
