// ============================================================
// Layer 3 — Core Traits (Service Seams)
// ============================================================
// The alignment core depends on two outside services and
// only through these traits:
//
//   TokenAligner    → a tokenised caption, asked "which token
//                     covers char i?"
//   PhraseExtractor → a noun-phrase chunker, asked "which
//                     phrases does this text contain?"
//
// Keeping the core behind traits means the positive-map and
// normalizer tests run against tiny hand-written fakes, with
// no tokenizer files or NLP models involved.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::entity::ExtractedPhrase;

// ─── TokenAligner ─────────────────────────────────────────────────────────────
/// The result of tokenising one caption.
///
/// Implementations:
///   - EncodedCaption → wraps a `tokenizers::Encoding`
pub trait TokenAligner {
    /// Token covering char `char_index`, or None when the char
    /// falls between tokens (whitespace, stripped punctuation).
    fn char_to_token(&self, char_index: usize) -> Option<usize>;

    /// Length, in chars, of the text that was tokenised.
    fn text_len(&self) -> usize;
}

// ─── PhraseExtractor ──────────────────────────────────────────────────────────
/// A noun-phrase extraction service.
///
/// Implementations hold heavyweight state in real deployments,
/// so each worker builds its own and never shares it.
///
/// Implementations:
///   - RuleChunker → function-word delimited noun chunks
pub trait PhraseExtractor {
    /// Phrases in order of appearance, with char spans into `text`.
    fn noun_phrases(&self, text: &str) -> Result<Vec<ExtractedPhrase>>;
}
