// ============================================================
// Error Taxonomy
// ============================================================
// Typed failures raised by the alignment and batching layers.
//
// The application and CLI layers wrap these in anyhow with
// context. The data layer returns them directly so callers
// can match on the variant (for example, the analysis path
// routes Alignment failures to its error file).
//
// Clone is required: a collate failure is the output item of
// burn's data loader, which clones batches between workers.

use thiserror::Error;

/// Result alias for the alignment and batching layers.
pub type Result<T> = std::result::Result<T, GroundingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroundingError {
    /// A precondition the algorithm relies on does not hold.
    /// Fatal for the current sample or file; never retried.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A span lies outside the caption it claims to index.
    /// Boundary misses inside the caption are recovered locally
    /// and never surface as this variant.
    #[error("span [{begin}, {end}) cannot be aligned against caption {caption:?}")]
    Alignment {
        begin:   usize,
        end:     usize,
        caption: String,
    },

    /// Row accounting after positive-map concatenation is off.
    #[error("batch assembly consumed {consumed} rows but allocated {allocated}")]
    BatchAssembly { consumed: usize, allocated: usize },

    /// A grounding key did not resolve to a position in the
    /// re-extracted caption (only raised under the error policy).
    #[error("grounding {key:?} of entity {entity:?} does not resolve to a caption position")]
    UnresolvedGrounding { entity: String, key: String },

    #[error("cannot collate an empty batch")]
    EmptyBatch,

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("image error: {0}")]
    Image(String),
}

impl GroundingError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        GroundingError::InvariantViolation(msg.into())
    }

    pub fn image(msg: impl Into<String>) -> Self {
        GroundingError::Image(msg.into())
    }
}
