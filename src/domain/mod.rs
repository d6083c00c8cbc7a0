// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits describing what the system
// works with: captions, spans, entities, positive maps and
// grounding records.
//
// Rules for this layer:
//   - NO burn tensor types
//   - NO file I/O
//   - Only plain structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Character spans tagged with their coordinate system
pub mod span;

/// Origin/normalized caption pair and the offset map between them
pub mod caption;

/// Extracted phrases and renamed entity sets
pub mod entity;

/// Entity-to-token alignment matrix
pub mod positive_map;

/// Persisted per-sample grounding results
pub mod grounding;

/// Tokenizer and phrase-extractor seams
pub mod traits;
