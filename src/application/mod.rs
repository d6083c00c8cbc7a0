// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// offline job each:
//
//   rekey   — re-key persisted grounding records by origin
//             caption position, partitioned across ranks
//   align   — annotate a caption file with entities and
//             token alignments
//   collate — build samples from a manifest and stream them
//             through burn's DataLoader
//
// Rules for this layer:
//   - No alignment or tensor math here (that's Layer 4)
//   - No argument parsing or printing (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Offline grounding re-keyer
pub mod rekey_use_case;

// Batched caption analysis
pub mod align_use_case;

// Manifest → DataLoader → collated batches
pub mod collate_use_case;
