// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from a raw caption and image
// all the way to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   raw caption                      raw image bytes
//       │                                  │
//       ▼                                  ▼
//   Preprocessor   → markup → spaces   ImageResizer → CHW tensor
//       │                                  │
//       ▼                                  │
//   PhraseExtractor → noun phrases         │
//       │                                  │
//       ▼                                  │
//   EntityNormalizer → unique entities     │
//       │                                  │
//       ▼                                  │
//   build_positive_map → (entities × slot) │
//       │                                  │
//       └──────────► GroundingSample ◄─────┘
//                         │
//                         ▼
//   GroundingBatcher → padded images + stacked positive maps
//
// The offline re-keyer uses the offset reconciler instead of
// the preprocessor: punctuation is deleted, not replaced, so
// positions must be mapped back to the origin caption.
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Punctuation stripping and origin/normalized offset maps
pub mod offset;

/// Replaces markup chars in raw captions
pub mod preprocessor;

/// Rule-based noun-phrase extractor
pub mod extractor;

/// Entity filtering, renaming and fallback
pub mod normalizer;

/// Entity spans → token alignment matrix
pub mod positive_map;

/// Image decoding, resizing and normalisation
pub mod image;

/// Image padding and positive-map concatenation
pub mod assembler;

/// Grounding samples and Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait for grounding samples
pub mod batcher;

/// Partitions input files across ranks
pub mod splitter;
