// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `rekey`, `align` and
// `collate`, and all their configurable flags.
//
// Every subcommand accepts `--config <file.json>`. When given,
// the file supplies the whole configuration and the other
// flags are ignored; otherwise the flags are converted into
// the application-layer config with From.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    align_use_case::AlignConfig,
    collate_use_case::{CollateRunConfig, DeviceKind},
    rekey_use_case::{RekeyConfig, UnresolvedPolicy},
};
use crate::data::{batcher::CollateConfig, image::Resolution, positive_map::DEFAULT_SLOT_WIDTH};
use crate::infra::worker_pool::DEFAULT_POOL_SIZE;

/// The three top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-key grounding records by origin caption position
    Rekey(RekeyArgs),

    /// Annotate captions with entities and token alignments
    Align(AlignArgs),

    /// Build samples from a manifest and collate them into batches
    Collate(CollateArgs),
}

// ─── Value enums ──────────────────────────────────────────────────────────────
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    /// Leave the record out of the output
    Drop,
    /// Count the record as failed
    Error,
}

impl From<PolicyArg> for UnresolvedPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Drop  => UnresolvedPolicy::Drop,
            PolicyArg::Error => UnresolvedPolicy::Error,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    Cpu,
    Wgpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu  => DeviceKind::Cpu,
            DeviceArg::Wgpu => DeviceKind::Wgpu,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ResolutionArg {
    #[value(name = "240p")]
    P240,
    #[value(name = "480p")]
    P480,
    #[value(name = "720p")]
    P720,
    #[value(name = "1080p")]
    P1080,
    #[value(name = "2k")]
    K2,
    #[value(name = "4k")]
    K4,
}

impl From<ResolutionArg> for Resolution {
    fn from(r: ResolutionArg) -> Self {
        match r {
            ResolutionArg::P240  => Resolution::P240,
            ResolutionArg::P480  => Resolution::P480,
            ResolutionArg::P720  => Resolution::P720,
            ResolutionArg::P1080 => Resolution::P1080,
            ResolutionArg::K2    => Resolution::K2,
            ResolutionArg::K4    => Resolution::K4,
        }
    }
}

// ─── rekey ────────────────────────────────────────────────────────────────────
/// All arguments for the `rekey` command.
#[derive(Args, Debug)]
pub struct RekeyArgs {
    /// Directory of <subdir>/<file>.jsonl grounding records
    #[arg(long, default_value = "data/grounding")]
    pub input_dir: String,

    /// Where re-keyed files are written, mirroring the input layout
    #[arg(long, default_value = "data/grounding_rekeyed")]
    pub output_dir: String,

    /// Index of this process among `world_size`
    #[arg(long, default_value_t = 0)]
    pub rank: usize,

    /// Number of processes sharing the input files
    #[arg(long, default_value_t = 1)]
    pub world_size: usize,

    /// Files processed concurrently
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub workers: usize,

    /// What to do with groundings whose key matches no phrase
    #[arg(long, value_enum, default_value_t = PolicyArg::Drop)]
    pub on_unresolved: PolicyArg,

    /// JSON file with a complete RekeyConfig
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Convert CLI RekeyArgs into the application-layer RekeyConfig.
impl From<RekeyArgs> for RekeyConfig {
    fn from(a: RekeyArgs) -> Self {
        RekeyConfig {
            input_dir:     a.input_dir,
            output_dir:    a.output_dir,
            rank:          a.rank,
            world_size:    a.world_size,
            workers:       a.workers,
            on_unresolved: a.on_unresolved.into(),
        }
    }
}

// ─── align ────────────────────────────────────────────────────────────────────
/// All arguments for the `align` command.
#[derive(Args, Debug)]
pub struct AlignArgs {
    /// JSONL file of {"id", "caption"} lines
    #[arg(long, default_value = "data/captions.jsonl")]
    pub input: String,

    /// Directory for alignments.jsonl and errors.jsonl
    #[arg(long, default_value = "data/alignments")]
    pub output_dir: String,

    /// Directory holding (or receiving) tokenizer.json
    #[arg(long, default_value = "data/tokenizer")]
    pub tokenizer_dir: String,

    /// Token columns per positive-map row
    #[arg(long, default_value_t = DEFAULT_SLOT_WIDTH)]
    pub slot_width: usize,

    /// Vocabulary size when a tokenizer has to be built
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Offset added to entity indices in label_to_token
    #[arg(long, default_value_t = 0)]
    pub label_offset: usize,

    /// JSON file with a complete AlignConfig
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl From<AlignArgs> for AlignConfig {
    fn from(a: AlignArgs) -> Self {
        AlignConfig {
            input:         a.input,
            output_dir:    a.output_dir,
            tokenizer_dir: a.tokenizer_dir,
            slot_width:    a.slot_width,
            vocab_size:    a.vocab_size,
            label_offset:  a.label_offset,
        }
    }
}

// ─── collate ──────────────────────────────────────────────────────────────────
/// All arguments for the `collate` command.
#[derive(Args, Debug)]
pub struct CollateArgs {
    /// JSONL manifest of {"id", "image", "caption"} lines
    #[arg(long, default_value = "data/manifest.jsonl")]
    pub manifest: String,

    /// Directory holding (or receiving) tokenizer.json
    #[arg(long, default_value = "data/tokenizer")]
    pub tokenizer_dir: String,

    /// Samples per batch
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Pixel budget images are resized to
    #[arg(long, value_enum, default_value_t = ResolutionArg::P720)]
    pub resolution: ResolutionArg,

    /// Device the batches are created on
    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,

    /// Padded image height and width are rounded up to this (0 = off)
    #[arg(long, default_value_t = 32)]
    pub size_divisible: usize,

    /// Token columns per positive-map row
    #[arg(long, default_value_t = DEFAULT_SLOT_WIDTH)]
    pub slot_width: usize,

    /// Vocabulary size when a tokenizer has to be built
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// JSON file with a complete CollateRunConfig
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl From<CollateArgs> for CollateRunConfig {
    fn from(a: CollateArgs) -> Self {
        CollateRunConfig {
            manifest:      a.manifest,
            tokenizer_dir: a.tokenizer_dir,
            batch_size:    a.batch_size,
            num_workers:   a.num_workers,
            resolution:    a.resolution.into(),
            device:        a.device.into(),
            vocab_size:    a.vocab_size,
            collate:       CollateConfig {
                size_divisible: a.size_divisible,
                slot_width:     a.slot_width,
            },
        }
    }
}
