// ============================================================
// Layer 3 — Entity Types
// ============================================================
// ExtractedPhrase    → what the noun-phrase extractor returns
// NormalizedEntities → the full per-sample entity set with the
//                      lookup maps the batch carries downstream

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::domain::span::Span;

/// A noun phrase as reported by the extraction service.
/// `begin`/`end` are char positions in the text that was given
/// to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPhrase {
    pub text:  String,
    pub begin: usize,
    pub end:   usize,
}

impl ExtractedPhrase {
    pub fn new(text: impl Into<String>, begin: usize, end: usize) -> Self {
        Self { text: text.into(), begin, end }
    }
}

/// The disambiguated entity set of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntities<C> {
    /// Entity names in extraction order
    pub entities:    Vec<String>,
    /// Renamed entity → originating phrase text
    pub new_to_old:  BTreeMap<String, String>,
    /// Renamed entity → span in the caption
    pub new_to_span: BTreeMap<String, Span<C>>,
    /// True when no phrase survived filtering and the whole
    /// caption stands in as the single entity
    pub empty_nouns: bool,
}

impl<C: Copy> NormalizedEntities<C> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// One span group per entity, in entity order — the row
    /// layout of the positive map.
    pub fn token_groups(&self) -> Vec<Vec<Span<C>>> {
        self.entities
            .iter()
            .map(|name| self.new_to_span.get(name).copied().into_iter().collect())
            .collect()
    }
}
