// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in any
// specific business layer:
//
//   tokenizer_store.rs — Tokenizer persistence
//                        Loads tokenizer.json, or builds a
//                        word-level tokenizer from the captions
//                        when none exists. Adapts encodings to
//                        the TokenAligner trait.
//
//   jsonl.rs           — JSON lines reading and append-writing
//
//   config_store.rs    — Optional JSON config input and the
//                        run_config.json written beside outputs
//
//   stats.rs           — Per-file line counts, appended to a
//                        CSV file for later analysis
//
//   worker_pool.rs     — Bounded wave-based thread pool with
//                        per-worker state
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Tokenizer loading, building, and char-offset alignment
pub mod tokenizer_store;

/// Newline-delimited JSON files
pub mod jsonl;

/// Run configuration persistence
pub mod config_store;

/// Per-file statistics CSV logger
pub mod stats;

/// Bounded worker pool
pub mod worker_pool;
