// ============================================================
// Layer 2 — AlignUseCase
// ============================================================
// Batched analysis path: annotates every caption of a JSONL
// file with its entities and token alignment.
//
//   Step 1: Read caption lines            (Layer 6 - infra)
//   Step 2: Load / build tokenizer        (Layer 6 - infra)
//   Step 3: Delete previous outputs       (Layer 6 - infra)
//   Step 4: Align each caption            (Layer 4 - data)
//   Step 5: Write alignments and errors   (Layer 6 - infra)
//
// Input line:
//   { "id": "000123", "caption": "...", "status": "success" }
//   `id` defaults to the line number; lines whose `status` is
//   present and not "success" are skipped.
//
// Outputs in <output_dir>:
//   alignments.jsonl — one AlignmentRecord per caption
//   errors.jsonl     — the raw line and the failure reason
//   run_config.json, stats.csv
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use crate::data::{
    dataset::SampleBuilder,
    extractor::RuleChunker,
    positive_map::DEFAULT_SLOT_WIDTH,
};
use crate::domain::{grounding::STATUS_SUCCESS, span::{Origin, Span}};
use crate::infra::{
    config_store::ConfigStore,
    jsonl::{read_lines, remove_if_exists, JsonlWriter},
    stats::{FileStats, StatsLogger},
    tokenizer_store::TokenizerStore,
};

pub const ALIGNMENTS_FILE: &str = "alignments.jsonl";
pub const ERRORS_FILE:     &str = "errors.jsonl";

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    pub input:         String,
    pub output_dir:    String,
    pub tokenizer_dir: String,
    pub slot_width:    usize,
    pub vocab_size:    usize,
    /// Offset added to row indices in `label_to_token`
    /// (1 for heads that reserve row 0)
    pub label_offset:  usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            input:         "data/captions.jsonl".to_string(),
            output_dir:    "data/alignments".to_string(),
            tokenizer_dir: "data/tokenizer".to_string(),
            slot_width:    DEFAULT_SLOT_WIDTH,
            vocab_size:    30522,
            label_offset:  0,
        }
    }
}

// ─── Line formats ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
struct CaptionLine {
    #[serde(default)]
    id:      Option<String>,
    #[serde(default)]
    status:  Option<String>,
    caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub id:             String,
    pub caption:        String,
    pub entities:       Vec<String>,
    pub new_to_old:     BTreeMap<String, String>,
    pub new_to_span:    BTreeMap<String, Span<Origin>>,
    pub empty_nouns:    bool,
    pub label_to_token: BTreeMap<usize, Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorRecord {
    line:   usize,
    raw:    String,
    reason: String,
}

// ─── AlignUseCase ─────────────────────────────────────────────────────────────
pub struct AlignUseCase {
    config: AlignConfig,
}

impl AlignUseCase {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FileStats> {
        let cfg        = &self.config;
        let output_dir = Path::new(&cfg.output_dir);

        // ── Step 1: Read caption lines ────────────────────────────────────────
        let lines = read_lines::<CaptionLine>(Path::new(&cfg.input))?;
        tracing::info!("Read {} lines from '{}'", lines.len(), cfg.input);

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        // A freshly built vocabulary covers every caption of this input
        let texts: Vec<String> = lines
            .iter()
            .filter_map(|l| l.value.as_ref().ok().map(|c| c.caption.clone()))
            .collect();
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_dir).load_or_build(&texts, cfg.vocab_size)?;

        // ── Step 3: Fresh outputs ─────────────────────────────────────────────
        ConfigStore::new(output_dir)?.save(cfg)?;
        let out_path = output_dir.join(ALIGNMENTS_FILE);
        let err_path = output_dir.join(ERRORS_FILE);
        remove_if_exists(&out_path)?;
        remove_if_exists(&err_path)?;

        let mut out = JsonlWriter::append(&out_path)?;
        let mut err = JsonlWriter::append(&err_path)?;

        // ── Step 4 + 5: Align and write ───────────────────────────────────────
        let extractor = RuleChunker::new();
        let builder   = SampleBuilder::new(&tokenizer, &extractor, cfg.slot_width);
        let mut stats = FileStats::new(cfg.input.clone());

        for line in lines {
            stats.read += 1;
            let outcome = line.value.and_then(|c| {
                if c.status.as_deref().is_some_and(|s| s != STATUS_SUCCESS) {
                    return Ok(None);
                }
                let alignment = builder.align_caption(&c.caption)?;
                Ok(Some(AlignmentRecord {
                    id:             c.id.unwrap_or_else(|| line.number.to_string()),
                    caption:        alignment.caption,
                    label_to_token: alignment.positive_map.label_to_token(cfg.label_offset),
                    entities:       alignment.entities.entities,
                    new_to_old:     alignment.entities.new_to_old,
                    new_to_span:    alignment.entities.new_to_span,
                    empty_nouns:    alignment.entities.empty_nouns,
                }))
            });

            match outcome {
                Ok(Some(record)) => {
                    out.write(&record)?;
                    stats.written += 1;
                }
                Ok(None) => stats.skipped += 1,
                Err(e) => {
                    tracing::debug!("line {}: {:#}", line.number, e);
                    err.write(&ErrorRecord { line: line.number, raw: line.raw, reason: format!("{e:#}") })?;
                    stats.failed += 1;
                }
            }
        }

        out.finish()?;
        err.finish()?;
        StatsLogger::new(output_dir)?.log(&stats)?;

        tracing::info!(
            "Aligned {} captions ({} skipped, {} failed) → '{}'",
            stats.written,
            stats.skipped,
            stats.failed,
            out_path.display()
        );
        Ok(stats)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::jsonl::Line;
    use std::fs;

    fn config(dir: &Path) -> AlignConfig {
        AlignConfig {
            input:         dir.join("captions.jsonl").display().to_string(),
            output_dir:    dir.join("out").display().to_string(),
            tokenizer_dir: dir.join("tok").display().to_string(),
            slot_width:    64,
            vocab_size:    1000,
            label_offset:  1,
        }
    }

    #[test]
    fn test_alignments_errors_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(
            &cfg.input,
            [
                r#"{"id": "a", "caption": "a dog on the grass"}"#,
                r#"{"caption": "wow", "status": "success"}"#,
                r#"{"caption": "a cat", "status": "failed"}"#,
                r#"{"no_caption": true}"#,
            ]
            .join("\n"),
        )
        .unwrap();

        let stats = AlignUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!((stats.read, stats.written, stats.skipped, stats.failed), (4, 2, 1, 1));

        let out = Path::new(&cfg.output_dir);
        let records: Vec<Line<AlignmentRecord>> = read_lines(&out.join(ALIGNMENTS_FILE)).unwrap();
        let first = records[0].value.as_ref().unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(first.entities, vec!["a dog", "the grass"]);
        // plus = 1: rows are keyed from 1
        assert_eq!(first.label_to_token[&1], vec![1, 2]);
        assert_eq!(first.label_to_token[&2], vec![4, 5]);

        let second = records[1].value.as_ref().unwrap();
        assert_eq!(second.id, "2");
        assert!(second.empty_nouns);

        let errors = fs::read_to_string(out.join(ERRORS_FILE)).unwrap();
        assert_eq!(errors.lines().count(), 1);
        assert!(errors.contains("no_caption"));
        assert!(out.join("run_config.json").exists());
    }

    #[test]
    fn test_rerun_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(&cfg.input, r#"{"caption": "a dog"}"#).unwrap();

        AlignUseCase::new(cfg.clone()).execute().unwrap();
        AlignUseCase::new(cfg.clone()).execute().unwrap();

        let out = Path::new(&cfg.output_dir).join(ALIGNMENTS_FILE);
        assert_eq!(fs::read_to_string(out).unwrap().lines().count(), 1);
    }
}
