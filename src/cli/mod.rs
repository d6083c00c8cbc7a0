// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `rekey`   — re-keys grounding records across ranks
//   2. `align`   — writes entity/token alignments for captions
//   3. `collate` — collates manifest samples into batches
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use commands::{AlignArgs, CollateArgs, Commands, RekeyArgs};
use crate::infra::config_store::load_config;

/// The main CLI struct
#[derive(Parser, Debug)]
#[command(
    name = "grounding-collate",
    version = "0.1.0",
    about = "Build entity/token alignments, re-key grounding records and collate grounding batches."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// A config file when one was given, the converted flags otherwise.
fn resolve<A, C>(config: Option<PathBuf>, args: A) -> Result<C>
where
    A: Into<C>,
    C: DeserializeOwned,
{
    match config {
        Some(path) => {
            tracing::info!("Using config file '{}'", path.display());
            load_config(&path)
        }
        None => Ok(args.into()),
    }
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Rekey(args)   => run_rekey(args),
            Commands::Align(args)   => run_align(args),
            Commands::Collate(args) => run_collate(args),
        }
    }
}

fn run_rekey(mut args: RekeyArgs) -> Result<()> {
    use crate::application::rekey_use_case::{RekeyConfig, RekeyUseCase};

    let config: RekeyConfig = resolve(args.config.take(), args)?;
    let stats = RekeyUseCase::new(config).execute()?;

    println!(
        "Re-keying complete: {} written, {} skipped, {} failed.",
        stats.written, stats.skipped, stats.failed
    );
    Ok(())
}

fn run_align(mut args: AlignArgs) -> Result<()> {
    use crate::application::align_use_case::{AlignConfig, AlignUseCase};

    let config: AlignConfig = resolve(args.config.take(), args)?;
    let output_dir          = config.output_dir.clone();
    let stats               = AlignUseCase::new(config).execute()?;

    println!(
        "Alignment complete: {} captions written to '{}' ({} failed).",
        stats.written, output_dir, stats.failed
    );
    Ok(())
}

fn run_collate(mut args: CollateArgs) -> Result<()> {
    use crate::application::collate_use_case::{CollateRunConfig, CollateUseCase};

    let config: CollateRunConfig = resolve(args.config.take(), args)?;
    let summary                  = CollateUseCase::new(config).execute()?;

    println!(
        "Collated {} samples into {} batches ({} entity rows, {} skipped).",
        summary.samples, summary.batches, summary.entity_rows, summary.skipped
    );
    Ok(())
}
