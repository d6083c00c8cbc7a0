// ============================================================
// Layer 4 — Grounding Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a
// Vec<GroundingSample> into device tensors.
//
// A batch is classified once on entry:
//
//   all Annotated → GroundingBatch
//     images        [N, C, H', W']  zero-padded, H'/W' rounded
//                                   up to size_divisible
//     positive_map  [Σ rows_i, max cols_i], rows of sample i at
//                   row_offsets[i]..row_offsets[i + 1]
//     plus N-length captions, entities, rename maps, spans,
//     origin sizes and ids, all in input order
//
//   all Opaque    → PassthroughBatch
//     padded images and ids; the JSON targets are untouched
//
//   mixed         → InvariantViolation
//
// The Batcher output is a Result: a collate failure reaches the
// loading loop as a value instead of a panic inside a worker.
//
// Reference: Burn Book §4 (Batcher)

use std::collections::BTreeMap;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    assembler::{assemble, concat_positive_maps, pad_images, PaddedImages},
    dataset::{AnnotatedTarget, GroundingSample, Target},
    image::ImageTensor,
    positive_map::DEFAULT_SLOT_WIDTH,
};
use crate::domain::{
    positive_map::PositiveMap,
    span::{Origin, Span},
};
use crate::error::{GroundingError, Result};

// ─── CollateConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateConfig {
    /// Padded H and W are rounded up to a multiple of this; 0 disables
    pub size_divisible: usize,
    /// Token columns of a positive map row
    pub slot_width:     usize,
}

impl Default for CollateConfig {
    fn default() -> Self {
        Self { size_divisible: 32, slot_width: DEFAULT_SLOT_WIDTH }
    }
}

// ─── Batch types ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct GroundingBatch<B: Backend> {
    /// [N, C, H', W']
    pub images:            Tensor<B, 4>,
    /// (H_i, W_i) before padding
    pub image_sizes:       Vec<[usize; 2]>,
    /// [Σ rows_i, max cols_i]
    pub positive_map:      Tensor<B, 2>,
    /// Length N + 1
    pub row_offsets:       Vec<usize>,
    pub positive_map_eval: Option<Tensor<B, 2>>,
    pub captions:          Vec<String>,
    pub entities:          Vec<Vec<String>>,
    pub new_to_old:        Vec<BTreeMap<String, String>>,
    pub new_to_span:       Vec<BTreeMap<String, Span<Origin>>>,
    pub empty_nouns:       Vec<bool>,
    /// (height, width) of each image before resizing
    pub origin_sizes:      Vec<[usize; 2]>,
    pub ids:               Vec<String>,
}

impl<B: Backend> GroundingBatch<B> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Clone)]
pub struct PassthroughBatch<B: Backend> {
    pub images:      Tensor<B, 4>,
    pub image_sizes: Vec<[usize; 2]>,
    pub targets:     Vec<serde_json::Map<String, serde_json::Value>>,
    pub ids:         Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Collated<B: Backend> {
    Grounding(GroundingBatch<B>),
    Passthrough(PassthroughBatch<B>),
}

// ─── Classification ───────────────────────────────────────────────────────────
/// A batch whose samples all share one target variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetBatch {
    Annotated {
        ids:     Vec<String>,
        images:  Vec<ImageTensor>,
        targets: Vec<AnnotatedTarget>,
    },
    Opaque {
        ids:     Vec<String>,
        images:  Vec<ImageTensor>,
        targets: Vec<serde_json::Map<String, serde_json::Value>>,
    },
}

impl TargetBatch {
    pub fn classify(items: Vec<GroundingSample>) -> Result<Self> {
        let annotated = match items.first() {
            None    => return Err(GroundingError::EmptyBatch),
            Some(s) => matches!(s.target, Target::Annotated(_)),
        };

        let mut ids    = Vec::with_capacity(items.len());
        let mut images = Vec::with_capacity(items.len());

        if annotated {
            let mut targets = Vec::with_capacity(items.len());
            for sample in items {
                match sample.target {
                    Target::Annotated(t) => targets.push(t),
                    Target::Opaque(_)    => return Err(mixed(&sample.id)),
                }
                ids.push(sample.id);
                images.push(sample.image);
            }
            Ok(TargetBatch::Annotated { ids, images, targets })
        } else {
            let mut targets = Vec::with_capacity(items.len());
            for sample in items {
                match sample.target {
                    Target::Opaque(t)    => targets.push(t),
                    Target::Annotated(_) => return Err(mixed(&sample.id)),
                }
                ids.push(sample.id);
                images.push(sample.image);
            }
            Ok(TargetBatch::Opaque { ids, images, targets })
        }
    }
}

fn mixed(id: &str) -> GroundingError {
    GroundingError::invariant(format!("sample '{id}' does not match the target type of its batch"))
}

// ─── Tensor conversion ────────────────────────────────────────────────────────
fn image_tensor<B: Backend>(padded: PaddedImages, device: &B::Device) -> Tensor<B, 4> {
    Tensor::from_data(TensorData::new(padded.data, padded.shape), device)
}

fn map_tensor<B: Backend>(map: PositiveMap, device: &B::Device) -> Tensor<B, 2> {
    let shape = map.shape();
    Tensor::from_data(TensorData::new(map.into_vec(), shape), device)
}

// ─── GroundingBatcher ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct GroundingBatcher {
    config: CollateConfig,
}

impl GroundingBatcher {
    pub fn new(config: CollateConfig) -> Self {
        Self { config }
    }

    pub fn collate<B: Backend>(&self, items: Vec<GroundingSample>, device: &B::Device) -> Result<Collated<B>> {
        match TargetBatch::classify(items)? {
            TargetBatch::Annotated { ids, images, targets } => {
                self.collate_annotated(ids, images, targets, device).map(Collated::Grounding)
            }
            TargetBatch::Opaque { ids, images, targets } => {
                let padded      = pad_images(&images, self.config.size_divisible)?;
                let image_sizes = padded.image_sizes.clone();
                Ok(Collated::Passthrough(PassthroughBatch {
                    images: image_tensor(padded, device),
                    image_sizes,
                    targets,
                    ids,
                }))
            }
        }
    }

    fn collate_annotated<B: Backend>(
        &self,
        ids:     Vec<String>,
        images:  Vec<ImageTensor>,
        targets: Vec<AnnotatedTarget>,
        device:  &B::Device,
    ) -> Result<GroundingBatch<B>> {
        if let Some((i, t)) = targets
            .iter()
            .enumerate()
            .find(|(_, t)| t.positive_map.cols() > self.config.slot_width)
        {
            return Err(GroundingError::invariant(format!(
                "positive map of '{}' has {} columns, slot width is {}",
                ids[i],
                t.positive_map.cols(),
                self.config.slot_width
            )));
        }

        let maps: Vec<&PositiveMap> = targets.iter().map(|t| &t.positive_map).collect();
        let assembled = assemble(&images, &maps, self.config.size_divisible)?;

        let eval_maps: Vec<&PositiveMap> = targets.iter().filter_map(|t| t.positive_map_eval.as_ref()).collect();
        let positive_map_eval = if eval_maps.is_empty() {
            None
        } else if eval_maps.len() == targets.len() {
            Some(map_tensor(concat_positive_maps(&eval_maps)?.map, device))
        } else {
            tracing::warn!(
                "{} of {} samples carry an eval positive map, skipping it for this batch",
                eval_maps.len(),
                targets.len()
            );
            None
        };

        tracing::debug!(
            "collated {} samples: images {:?}, positive map {:?}",
            ids.len(),
            assembled.images.shape,
            assembled.positive_map.map.shape()
        );

        let image_sizes = assembled.images.image_sizes.clone();
        let row_offsets = assembled.positive_map.row_offsets;

        let mut batch = GroundingBatch {
            images:            image_tensor(assembled.images, device),
            image_sizes,
            positive_map:      map_tensor(assembled.positive_map.map, device),
            row_offsets,
            positive_map_eval,
            captions:          Vec::with_capacity(ids.len()),
            entities:          Vec::with_capacity(ids.len()),
            new_to_old:        Vec::with_capacity(ids.len()),
            new_to_span:       Vec::with_capacity(ids.len()),
            empty_nouns:       Vec::with_capacity(ids.len()),
            origin_sizes:      Vec::with_capacity(ids.len()),
            ids,
        };

        for target in targets {
            batch.captions.push(target.caption);
            batch.entities.push(target.entities.entities);
            batch.new_to_old.push(target.entities.new_to_old);
            batch.new_to_span.push(target.entities.new_to_span);
            batch.empty_nouns.push(target.entities.empty_nouns);
            batch.origin_sizes.push(target.origin_size);
        }

        Ok(batch)
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// This is what makes GroundingBatcher work with Burn's DataLoader.
impl<B: Backend> Batcher<B, GroundingSample, Result<Collated<B>>> for GroundingBatcher {
    fn batch(&self, items: Vec<GroundingSample>, device: &B::Device) -> Result<Collated<B>> {
        self.collate(items, device)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::NormalizedEntities;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn image(h: usize, w: usize) -> ImageTensor {
        ImageTensor::new(3, h, w, vec![1.0; 3 * h * w]).unwrap()
    }

    fn annotated(id: &str, h: usize, w: usize, names: &[&str], cols: usize) -> GroundingSample {
        let rows = names.len();
        let mut data = vec![0.0f32; rows * cols];
        for r in 0..rows {
            data[r * cols + r + 1] = 1.0;
        }
        let entities = NormalizedEntities {
            entities:    names.iter().map(|n| n.to_string()).collect(),
            new_to_old:  names.iter().map(|n| (n.to_string(), n.to_string())).collect(),
            new_to_span: names.iter().map(|n| (n.to_string(), Span::new(0, n.len()))).collect(),
            empty_nouns: false,
        };
        GroundingSample {
            id:     id.to_string(),
            image:  image(h, w),
            target: Target::Annotated(AnnotatedTarget {
                caption:           names.join(" "),
                entities,
                positive_map:      PositiveMap::from_rows(rows, cols, data).unwrap(),
                positive_map_eval: None,
                origin_size:       [h * 2, w * 2],
            }),
        }
    }

    fn opaque(id: &str) -> GroundingSample {
        let mut map = serde_json::Map::new();
        map.insert("boxes".into(), serde_json::json!([[0, 0, 1, 1]]));
        GroundingSample { id: id.to_string(), image: image(4, 4), target: Target::Opaque(map) }
    }

    fn grounding(collated: Collated<TestBackend>) -> GroundingBatch<TestBackend> {
        match collated {
            Collated::Grounding(b)   => b,
            Collated::Passthrough(_) => panic!("expected a grounding batch"),
        }
    }

    #[test]
    fn test_annotated_batch_shapes_and_offsets() {
        let device  = Default::default();
        let batcher = GroundingBatcher::new(CollateConfig { size_divisible: 32, slot_width: 256 });
        let items   = vec![
            annotated("a", 30, 40, &["cat", "dog"], 256),
            annotated("b", 50, 20, &["tree"], 256),
        ];

        let batch = grounding(batcher.collate::<TestBackend>(items, &device).unwrap());
        assert_eq!(batch.images.dims(), [2, 3, 64, 64]);
        assert_eq!(batch.positive_map.dims(), [3, 256]);
        assert_eq!(batch.row_offsets, vec![0, 2, 3]);
        assert_eq!(batch.image_sizes, vec![[30, 40], [50, 20]]);
        assert_eq!(batch.ids, vec!["a", "b"]);
        assert_eq!(batch.entities[1], vec!["tree"]);
        assert_eq!(batch.origin_sizes[0], [60, 80]);
        assert!(batch.positive_map_eval.is_none());
    }

    #[test]
    fn test_positive_map_values_survive_transfer() {
        let device  = Default::default();
        let batcher = GroundingBatcher::new(CollateConfig { size_divisible: 0, slot_width: 8 });
        let items   = vec![annotated("a", 2, 2, &["x"], 4), annotated("b", 2, 2, &["y", "z"], 8)];

        let batch  = grounding(batcher.collate::<TestBackend>(items, &device).unwrap());
        let values = batch.positive_map.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values.len(), 3 * 8);
        assert_eq!(&values[0..8],  &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&values[8..16], &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(values[16 + 2], 1.0);
    }

    #[test]
    fn test_opaque_batch_passes_targets_through() {
        let device  = Default::default();
        let batcher = GroundingBatcher::default();

        match batcher.collate::<TestBackend>(vec![opaque("x"), opaque("y")], &device).unwrap() {
            Collated::Passthrough(b) => {
                assert_eq!(b.ids, vec!["x", "y"]);
                assert_eq!(b.targets[0]["boxes"], serde_json::json!([[0, 0, 1, 1]]));
                assert_eq!(b.images.dims(), [2, 3, 32, 32]);
            }
            Collated::Grounding(_) => panic!("expected a passthrough batch"),
        }
    }

    #[test]
    fn test_mixed_batch_is_rejected() {
        let device = Default::default();
        let items  = vec![annotated("a", 2, 2, &["x"], 4), opaque("b")];
        let err    = GroundingBatcher::default().collate::<TestBackend>(items, &device).unwrap_err();
        assert!(matches!(err, GroundingError::InvariantViolation(_)));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let device = Default::default();
        let err    = GroundingBatcher::default().collate::<TestBackend>(Vec::new(), &device).unwrap_err();
        assert_eq!(err, GroundingError::EmptyBatch);
    }

    #[test]
    fn test_map_wider_than_slot_is_rejected() {
        let device  = Default::default();
        let batcher = GroundingBatcher::new(CollateConfig { size_divisible: 0, slot_width: 4 });
        let err     = batcher.collate::<TestBackend>(vec![annotated("a", 2, 2, &["x"], 8)], &device).unwrap_err();
        assert!(matches!(err, GroundingError::InvariantViolation(_)));
    }

    #[test]
    fn test_eval_maps_concatenated_when_all_present() {
        let device = Default::default();
        let mut items = vec![annotated("a", 2, 2, &["x"], 4), annotated("b", 2, 2, &["y", "z"], 4)];
        for item in &mut items {
            if let Target::Annotated(t) = &mut item.target {
                t.positive_map_eval = Some(t.positive_map.clone());
            }
        }
        let batch = grounding(GroundingBatcher::default().collate::<TestBackend>(items, &device).unwrap());
        assert_eq!(batch.positive_map_eval.map(|t| t.dims()), Some([3, 4]));
    }

    #[test]
    fn test_batcher_trait_delegates_to_collate() {
        fn run<Bt>(batcher: &Bt, items: Vec<GroundingSample>) -> Result<Collated<TestBackend>>
        where
            Bt: Batcher<TestBackend, GroundingSample, Result<Collated<TestBackend>>>,
        {
            batcher.batch(items, &Default::default())
        }

        let batch = grounding(run(&GroundingBatcher::default(), vec![annotated("a", 2, 2, &["x"], 4)]).unwrap());
        assert_eq!(batch.len(), 1);
    }
}
