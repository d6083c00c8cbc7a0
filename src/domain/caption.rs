// ============================================================
// Layer 3 — Caption and Offset Map
// ============================================================
// A Caption owns the authored text and derives everything
// else from it: the normalized (punctuation-stripped) text
// and the OffsetMap linking the two.
//
// OffsetMap indexing convention:
//   one entry per NORMALIZED char, holding the number of
//   origin chars deleted before that char's origin position.
//
//   origin_index(n) = n + offsets[n]
//
// Example:
//   origin     = "a, b."
//   normalized = "a b"
//   offsets    = [0, 1, 1]      ("," deleted before ' ')
//
// Reference: Rust Book §5 (Structs), §8 (Strings)

use serde::Serialize;

use crate::domain::span::{Normalized, Origin, Span};

/// Cumulative deletion counts, indexed by normalized char position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetMap {
    offsets: Vec<usize>,
}

impl OffsetMap {
    /// Wrap precomputed offsets. Callers in the data layer build
    /// these with `compute_offset_map`, which checks the invariants.
    pub(crate) fn from_offsets(offsets: Vec<usize>) -> Self {
        Self { offsets }
    }

    /// Deletions before normalized position `n`.
    pub fn get(&self, n: usize) -> Option<usize> {
        self.offsets.get(n).copied()
    }

    /// Origin char position of normalized char `n`.
    pub fn origin_index(&self, n: usize) -> Option<usize> {
        self.get(n).map(|offset| n + offset)
    }

    /// Translate a normalized span into origin coordinates.
    ///
    /// The end is mapped through the last included char, so a
    /// span never swallows punctuation that was deleted right
    /// after it. Returns None for empty or out-of-range spans.
    pub fn to_origin(&self, span: Span<Normalized>) -> Option<Span<Origin>> {
        if span.is_empty() {
            return None;
        }
        let begin = self.origin_index(span.begin)?;
        let last  = self.origin_index(span.end - 1)?;
        Some(Span::<Normalized>::new(begin, last + 1).retag())
    }
}

/// An authored caption with its derived normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caption {
    origin:     String,
    normalized: String,
    offsets:    OffsetMap,
}

impl Caption {
    pub(crate) fn from_parts(origin: String, normalized: String, offsets: OffsetMap) -> Self {
        Self { origin, normalized, offsets }
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }
}
