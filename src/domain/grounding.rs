// ============================================================
// Layer 3 — Grounding Record
// ============================================================
// One line of a grounding meta file:
//
//   {
//     "status": "success",
//     "caption": "a dog, on the grass.",
//     "groundings":          { "<entity>": { "<key>": <value> } },
//     "original_groundings": { "<entity>": { "<key>": <value> } },
//     ... any other fields ...
//   }
//
// The inner keys are what the re-keyer rewrites; the values
// (boxes, scores) are opaque here and carried as raw JSON.
// Unknown top-level fields survive a read/write round trip.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity → (position key → grounding value)
pub type Groundings = BTreeMap<String, BTreeMap<String, Value>>;

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingRecord {
    pub status: String,

    #[serde(default)]
    pub caption: String,

    #[serde(default)]
    pub groundings: Groundings,

    #[serde(default)]
    pub original_groundings: Groundings,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl GroundingRecord {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}
