// ============================================================
// Layer 2 — CollateUseCase
// ============================================================
// Builds grounding samples from a manifest and streams them
// through Burn's DataLoader with the GroundingBatcher:
//
//   Step 1: Read the manifest             (Layer 6 - infra)
//   Step 2: Load / build tokenizer        (Layer 6 - infra)
//   Step 3: Build annotated samples       (Layer 4 - data)
//   Step 4: Build the dataset             (Layer 4 - data)
//   Step 5: Collate batches on the device (Layer 4 - data)
//
// Manifest line:
//   { "id": "000123", "image": "images/000123.jpg", "caption": "..." }
//   Image paths are relative to the manifest's directory.
//
// Samples that cannot be built (unreadable image, alignment
// error) are logged and left out; a batch that fails to
// collate fails the run.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{Context, Result};
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{
    batcher::{Collated, CollateConfig, GroundingBatcher},
    dataset::{GroundingDataset, GroundingSample, SampleBuilder},
    extractor::RuleChunker,
    image::{ImageResizer, Resolution},
};
use crate::infra::{jsonl::read_lines, tokenizer_store::TokenizerStore};

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Wgpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateRunConfig {
    pub manifest:      String,
    pub tokenizer_dir: String,
    pub batch_size:    usize,
    pub num_workers:   usize,
    pub resolution:    Resolution,
    pub device:        DeviceKind,
    pub vocab_size:    usize,
    pub collate:       CollateConfig,
}

impl Default for CollateRunConfig {
    fn default() -> Self {
        Self {
            manifest:      "data/manifest.jsonl".to_string(),
            tokenizer_dir: "data/tokenizer".to_string(),
            batch_size:    8,
            num_workers:   1,
            resolution:    Resolution::P720,
            device:        DeviceKind::Cpu,
            vocab_size:    30522,
            collate:       CollateConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestLine {
    id:      String,
    image:   String,
    caption: String,
}

/// What a collate run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollateSummary {
    pub samples:     usize,
    pub skipped:     usize,
    pub batches:     usize,
    /// Total positive-map rows over all batches
    pub entity_rows: usize,
}

// ─── CollateUseCase ───────────────────────────────────────────────────────────
pub struct CollateUseCase {
    config: CollateRunConfig,
}

impl CollateUseCase {
    pub fn new(config: CollateRunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CollateSummary> {
        match self.config.device {
            DeviceKind::Cpu => {
                let device = burn::backend::ndarray::NdArrayDevice::Cpu;
                self.run::<burn::backend::NdArray>(device)
            }
            DeviceKind::Wgpu => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                self.run::<burn::backend::Wgpu>(device)
            }
        }
    }

    /// Steps 1–3: manifest → annotated samples.
    pub fn build_samples(&self) -> Result<(Vec<GroundingSample>, usize)> {
        let cfg      = &self.config;
        let manifest = Path::new(&cfg.manifest);
        let base     = manifest.parent().unwrap_or_else(|| Path::new("."));

        // ── Step 1: Read the manifest ─────────────────────────────────────────
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in read_lines::<ManifestLine>(manifest)? {
            match line.value {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    skipped += 1;
                }
            }
        }
        tracing::info!("Manifest lists {} samples", entries.len());

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let texts: Vec<String> = entries.iter().map(|e| e.caption.clone()).collect();
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_dir).load_or_build(&texts, cfg.vocab_size)?;

        // ── Step 3: Annotated samples ─────────────────────────────────────────
        let extractor = RuleChunker::new();
        let builder   = SampleBuilder::new(&tokenizer, &extractor, cfg.collate.slot_width);
        let resizer   = ImageResizer::for_resolution(cfg.resolution);

        let mut samples = Vec::with_capacity(entries.len());
        for entry in entries {
            let path   = base.join(&entry.image);
            let result = fs::read(&path)
                .with_context(|| format!("Cannot read image '{}'", path.display()))
                .and_then(|bytes| builder.build(entry.id.clone(), &bytes, &entry.caption, &resizer));
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!("Skipping sample '{}': {:#}", entry.id, e);
                    skipped += 1;
                }
            }
        }
        Ok((samples, skipped))
    }

    fn run<B: Backend>(&self, device: B::Device) -> Result<CollateSummary> {
        let cfg = &self.config;

        let (samples, skipped) = self.build_samples()?;
        let mut summary = CollateSummary { samples: samples.len(), skipped, ..CollateSummary::default() };
        if samples.is_empty() {
            tracing::warn!("No samples to collate");
            return Ok(summary);
        }

        // ── Step 4: Dataset ───────────────────────────────────────────────────
        let dataset = GroundingDataset::new(samples);

        // ── Step 5: Collate on the device ─────────────────────────────────────
        let loader = DataLoaderBuilder::<B, _, _>::new(GroundingBatcher::new(cfg.collate))
            .batch_size(cfg.batch_size.max(1))
            .num_workers(cfg.num_workers.max(1))
            .set_device(device)
            .build(dataset);

        for collated in loader.iter() {
            match collated? {
                Collated::Grounding(batch) => {
                    let [rows, cols] = batch.positive_map.dims();
                    tracing::info!(
                        "batch {}: {} samples, images {:?}, positive map [{}, {}]",
                        summary.batches,
                        batch.len(),
                        batch.images.dims(),
                        rows,
                        cols
                    );
                    summary.entity_rows += rows;
                }
                Collated::Passthrough(batch) => {
                    tracing::info!("batch {}: {} pass-through samples", summary.batches, batch.ids.len());
                }
            }
            summary.batches += 1;
        }

        tracing::info!(
            "Collated {} samples into {} batches ({} skipped)",
            summary.samples,
            summary.batches,
            summary.skipped
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([9, 9, 9]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn setup(dir: &Path) -> CollateRunConfig {
        fs::create_dir_all(dir.join("images")).unwrap();
        write_png(&dir.join("images").join("0.png"), 40, 30);
        write_png(&dir.join("images").join("1.png"), 30, 40);
        write_png(&dir.join("images").join("2.png"), 50, 50);

        let manifest = dir.join("manifest.jsonl");
        fs::write(
            &manifest,
            [
                r#"{"id": "0", "image": "images/0.png", "caption": "a dog and a cat"}"#,
                r#"{"id": "1", "image": "images/1.png", "caption": "the red car"}"#,
                r#"{"id": "2", "image": "images/2.png", "caption": "wow"}"#,
                r#"{"id": "3", "image": "images/missing.png", "caption": "a tree"}"#,
            ]
            .join("\n"),
        )
        .unwrap();

        CollateRunConfig {
            manifest:      manifest.display().to_string(),
            tokenizer_dir: dir.join("tok").display().to_string(),
            batch_size:    2,
            resolution:    Resolution::P240,
            vocab_size:    1000,
            ..CollateRunConfig::default()
        }
    }

    #[test]
    fn test_missing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (samples, skipped) = CollateUseCase::new(setup(dir.path())).build_samples().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_cpu_run_collates_all_batches() {
        let dir     = tempfile::tempdir().unwrap();
        let summary = CollateUseCase::new(setup(dir.path())).execute().unwrap();

        assert_eq!(summary.samples, 3);
        assert_eq!(summary.batches, 2);
        // "a dog", "a cat" + "the red car" + fallback "wow"
        assert_eq!(summary.entity_rows, 4);
    }
}
