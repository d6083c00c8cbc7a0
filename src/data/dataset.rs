// ============================================================
// Layer 4 — Grounding Samples and Dataset
// ============================================================
// One GroundingSample is what the batcher consumes:
//
//   id      → sample identifier from the source archive
//   image   → resized, normalised (C, H, W) tensor
//   target  → either an AnnotatedTarget (caption, entities,
//             positive map) or an opaque JSON dictionary used
//             by evaluation code that brings its own labels
//
// SampleBuilder produces annotated samples from raw
// (id, image bytes, caption) triples:
//
//   caption ──clean──▶ extract phrases ──▶ normalize entities
//      │                                        │
//      └──────tokenize──────▶ positive map ◀────┘
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    image::{ImageResizer, ImageTensor},
    normalizer::EntityNormalizer,
    positive_map::build_positive_map,
    preprocessor::Preprocessor,
};
use crate::domain::{
    entity::NormalizedEntities,
    positive_map::PositiveMap,
    span::Origin,
    traits::PhraseExtractor,
};
use crate::infra::tokenizer_store::EncodedCaption;

/// Labels of a training sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTarget {
    /// Cleaned caption; spans and the positive map index it
    pub caption:           String,
    pub entities:          NormalizedEntities<Origin>,
    pub positive_map:      PositiveMap,
    /// Separate map used by evaluation heads, when present
    pub positive_map_eval: Option<PositiveMap>,
    /// (height, width) of the image before resizing
    pub origin_size:       [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Annotated(AnnotatedTarget),
    Opaque(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSample {
    pub id:     String,
    pub image:  ImageTensor,
    pub target: Target,
}

// ─── GroundingDataset ─────────────────────────────────────────────────────────
pub struct GroundingDataset {
    samples: Vec<GroundingSample>,
}

impl GroundingDataset {
    pub fn new(samples: Vec<GroundingSample>) -> Self {
        Self { samples }
    }
}

impl Dataset<GroundingSample> for GroundingDataset {
    fn get(&self, index: usize) -> Option<GroundingSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── SampleBuilder ────────────────────────────────────────────────────────────
/// Turns raw (id, image, caption) triples into annotated samples.
pub struct SampleBuilder<'a, E: PhraseExtractor> {
    tokenizer:    &'a Tokenizer,
    extractor:    &'a E,
    normalizer:   EntityNormalizer,
    preprocessor: Preprocessor,
    slot_width:   usize,
}

/// Caption-side result of building one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionAlignment {
    pub caption:      String,
    pub entities:     NormalizedEntities<Origin>,
    pub positive_map: PositiveMap,
}

impl<'a, E: PhraseExtractor> SampleBuilder<'a, E> {
    pub fn new(tokenizer: &'a Tokenizer, extractor: &'a E, slot_width: usize) -> Self {
        Self {
            tokenizer,
            extractor,
            normalizer: EntityNormalizer::default(),
            preprocessor: Preprocessor::new(),
            slot_width,
        }
    }

    /// Clean the caption, extract and normalize its entities and
    /// build the positive map over its tokenisation.
    pub fn align_caption(&self, raw_caption: &str) -> anyhow::Result<CaptionAlignment> {
        let caption  = self.preprocessor.clean(raw_caption);
        let phrases  = self.extractor.noun_phrases(&caption)?;
        let entities = self.normalizer.normalize::<Origin>(&caption, &phrases);

        let encoded      = EncodedCaption::encode(self.tokenizer, &caption)?;
        let positive_map = build_positive_map(&encoded, &caption, &entities.token_groups(), self.slot_width)?;

        tracing::trace!(
            "aligned {} entities over {} tokens (empty_nouns={})",
            entities.len(),
            encoded.token_count(),
            entities.empty_nouns
        );

        Ok(CaptionAlignment { caption, entities, positive_map })
    }

    /// Build a fully annotated training sample.
    pub fn build(
        &self,
        id:          impl Into<String>,
        image_bytes: &[u8],
        raw_caption: &str,
        resizer:     &ImageResizer,
    ) -> anyhow::Result<GroundingSample> {
        let loaded    = resizer.load(image_bytes)?;
        let alignment = self.align_caption(raw_caption)?;

        Ok(GroundingSample {
            id:     id.into(),
            image:  loaded.tensor,
            target: Target::Annotated(AnnotatedTarget {
                caption:           alignment.caption,
                entities:          alignment.entities,
                positive_map:      alignment.positive_map,
                positive_map_eval: None,
                origin_size:       loaded.origin_size,
            }),
        })
    }
}
