// ============================================================
// Layer 3 — Coordinate-Tagged Character Spans
// ============================================================
// A caption exists in two forms: the origin text as authored
// and the normalized text with punctuation deleted. A span
// into one is meaningless in the other, so every span carries
// its coordinate system as a type parameter:
//
//   Span<Origin>      → indexes the authored caption
//   Span<Normalized>  → indexes the punctuation-stripped caption
//
// The only way to move a span between systems is through the
// OffsetMap (see caption.rs). Indices are char positions, not
// byte offsets.

use std::{fmt, marker::PhantomData};
use serde::{Deserialize, Serialize};

/// Marker: indices into the caption as authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Origin;

/// Marker: indices into the punctuation-stripped caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Normalized;

/// Half-open char interval `[begin, end)` in coordinate system `C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span<C> {
    pub begin: usize,
    pub end:   usize,
    #[serde(skip)]
    coords: PhantomData<C>,
}

impl<C> Span<C> {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end, coords: PhantomData }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Re-tag without touching the indices. Only the offset map
    /// is allowed to do this, after it has translated them.
    pub(crate) fn retag<D>(self) -> Span<D> {
        Span::new(self.begin, self.end)
    }
}

impl<C> fmt::Display for Span<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}
