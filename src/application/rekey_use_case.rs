// ============================================================
// Layer 2 — RekeyUseCase
// ============================================================
// Re-keys persisted grounding records so that every grounding
// is addressed by the origin-caption position of its phrase.
//
// Per record:
//   1. Skip unless status == "success"
//   2. Strip punctuation from the caption, build the offset map
//   3. Re-extract noun phrases from the normalized caption
//   4. new_pos[phrase] = origin index of the phrase start
//   5. Replace every inner key of `groundings` and
//      `original_groundings` by new_pos[key]
//
// Keys with no matching phrase follow the UnresolvedPolicy:
//   Drop  → the record is not re-emitted (counted as skipped)
//   Error → the record fails with UnresolvedGrounding
//
// Per run:
//   Step 1: List <input>/<subdir>/<file> pairs, sorted
//   Step 2: Keep this rank's contiguous chunk
//   Step 3: Save the run config next to the outputs
//   Step 4: Re-key files on the bounded worker pool, one
//           extractor per worker, writing
//           <output>/<subdir>/<file> in append mode
//   Step 5: Log per-file statistics
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::data::{extractor::RuleChunker, offset::reconcile, splitter::split_by_rank};
use crate::domain::{
    grounding::{GroundingRecord, Groundings},
    span::{Normalized, Span},
    traits::PhraseExtractor,
};
use crate::error::GroundingError;
use crate::infra::{
    config_store::ConfigStore,
    jsonl::{read_lines, JsonlWriter},
    stats::{FileStats, StatsLogger},
    worker_pool::{BoundedPool, DEFAULT_POOL_SIZE},
};

// ─── Configuration ────────────────────────────────────────────────────────────
/// What to do with a grounding whose key matches no phrase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    #[default]
    Drop,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RekeyConfig {
    pub input_dir:     String,
    pub output_dir:    String,
    pub rank:          usize,
    pub world_size:    usize,
    pub workers:       usize,
    pub on_unresolved: UnresolvedPolicy,
}

impl Default for RekeyConfig {
    fn default() -> Self {
        Self {
            input_dir:     "data/grounding".to_string(),
            output_dir:    "data/grounding_rekeyed".to_string(),
            rank:          0,
            world_size:    1,
            workers:       DEFAULT_POOL_SIZE,
            on_unresolved: UnresolvedPolicy::Drop,
        }
    }
}

// ─── Record re-keying ─────────────────────────────────────────────────────────
/// Phrase text → origin-caption position of its first char, as
/// a decimal string. A phrase seen twice keeps its last position.
pub fn phrase_positions<E: PhraseExtractor + ?Sized>(
    caption:   &str,
    extractor: &E,
) -> Result<HashMap<String, String>> {
    let reconciled = reconcile(caption)?;
    let phrases    = extractor.noun_phrases(reconciled.normalized())?;

    let mut new_pos = HashMap::with_capacity(phrases.len());
    for phrase in phrases {
        let span   = Span::<Normalized>::new(phrase.begin, phrase.end);
        let origin = reconciled.offsets().to_origin(span).ok_or_else(|| {
            GroundingError::Alignment {
                begin:   phrase.begin,
                end:     phrase.end,
                caption: reconciled.normalized().to_string(),
            }
        })?;
        new_pos.insert(phrase.text, origin.begin.to_string());
    }
    Ok(new_pos)
}

/// Rewrite the inner keys of one groundings map. Returns the first
/// unresolved (entity, key) pair instead when there is one.
fn rekey_groundings(
    groundings: &Groundings,
    new_pos:    &HashMap<String, String>,
) -> std::result::Result<Groundings, (String, String)> {
    let mut out = Groundings::new();
    for (entity, by_key) in groundings {
        // one map per entity, filled with every re-keyed entry
        let slot = out.entry(entity.clone()).or_insert_with(BTreeMap::new);
        for (key, value) in by_key {
            match new_pos.get(key) {
                Some(pos) => {
                    slot.insert(pos.clone(), value.clone());
                }
                None => return Err((entity.clone(), key.clone())),
            }
        }
    }
    Ok(out)
}

/// Re-key one record. `Ok(None)` means the record is not re-emitted.
pub fn rekey_record<E: PhraseExtractor + ?Sized>(
    record:    GroundingRecord,
    extractor: &E,
    policy:    UnresolvedPolicy,
) -> Result<Option<GroundingRecord>> {
    if !record.is_success() {
        return Ok(None);
    }

    let new_pos = phrase_positions(&record.caption, extractor)?;

    let rekeyed = rekey_groundings(&record.groundings, &new_pos)
        .and_then(|g| rekey_groundings(&record.original_groundings, &new_pos).map(|o| (g, o)));

    match rekeyed {
        Ok((groundings, original_groundings)) => Ok(Some(GroundingRecord {
            groundings,
            original_groundings,
            ..record
        })),
        Err((entity, key)) => match policy {
            UnresolvedPolicy::Drop => {
                tracing::debug!("Dropping record: {:?} of {:?} has no position in {:?}", key, entity, record.caption);
                Ok(None)
            }
            UnresolvedPolicy::Error => Err(GroundingError::UnresolvedGrounding { entity, key }.into()),
        },
    }
}

/// Re-key every line of `in_path`, appending results to `out_path`.
/// Line-level failures are counted, not propagated.
pub fn rekey_file<E: PhraseExtractor + ?Sized>(
    in_path:   &Path,
    out_path:  &Path,
    extractor: &E,
    policy:    UnresolvedPolicy,
) -> Result<FileStats> {
    let mut stats  = FileStats::new(in_path.display().to_string());
    let mut writer = JsonlWriter::append(out_path)?;

    for line in read_lines::<GroundingRecord>(in_path)? {
        stats.read += 1;
        let outcome = line.value.and_then(|record| rekey_record(record, extractor, policy));
        match outcome {
            Ok(Some(record)) => {
                writer.write(&record)?;
                stats.written += 1;
            }
            Ok(None) => stats.skipped += 1,
            Err(e) => {
                tracing::warn!("{} line {}: {:#}", in_path.display(), line.number, e);
                stats.failed += 1;
            }
        }
    }

    writer.finish()?;
    Ok(stats)
}

// ─── Task listing ─────────────────────────────────────────────────────────────
/// One input file, addressed by its sub-directory and file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RekeyTask {
    pub subdir: String,
    pub file:   String,
}

impl RekeyTask {
    pub fn input(&self, root: &Path) -> PathBuf {
        root.join(&self.subdir).join(&self.file)
    }

    pub fn output(&self, root: &Path) -> PathBuf {
        root.join(&self.subdir).join(&self.file)
    }
}

fn sorted_entries(dir: &Path, want_dirs: bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot list '{}'", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() == want_dirs {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Every file one level below a sub-directory of `input_dir`, sorted.
pub fn list_tasks(input_dir: &Path) -> Result<Vec<RekeyTask>> {
    let mut tasks = Vec::new();
    for subdir in sorted_entries(input_dir, true)? {
        for file in sorted_entries(&input_dir.join(&subdir), false)? {
            tasks.push(RekeyTask { subdir: subdir.clone(), file });
        }
    }
    Ok(tasks)
}

// ─── RekeyUseCase ─────────────────────────────────────────────────────────────
pub struct RekeyUseCase {
    config: RekeyConfig,
}

impl RekeyUseCase {
    pub fn new(config: RekeyConfig) -> Self {
        Self { config }
    }

    /// Run with the built-in rule chunker.
    pub fn execute(&self) -> Result<FileStats> {
        self.execute_with(|| Ok(RuleChunker::new()))
    }

    /// Run with extractors built by `factory`, one per worker thread.
    pub fn execute_with<E, F>(&self, factory: F) -> Result<FileStats>
    where
        E: PhraseExtractor,
        F: Fn() -> Result<E> + Sync,
    {
        let cfg        = &self.config;
        let input_dir  = Path::new(&cfg.input_dir);
        let output_dir = Path::new(&cfg.output_dir);

        // ── Step 1 + 2: List and partition input files ────────────────────────
        let all_tasks = list_tasks(input_dir)?;
        let total     = all_tasks.len();
        let tasks     = split_by_rank(all_tasks, cfg.rank, cfg.world_size);
        tracing::info!(
            "Rank {}/{}: re-keying {} of {} files from '{}'",
            cfg.rank,
            cfg.world_size,
            tasks.len(),
            total,
            input_dir.display()
        );

        // ── Step 3: Record the run configuration ──────────────────────────────
        ConfigStore::new(output_dir)?.save(cfg)?;
        let stats_log = StatsLogger::new(output_dir)?;

        // ── Step 4: Process files on the pool ─────────────────────────────────
        let pool    = BoundedPool::new(cfg.workers);
        let policy  = cfg.on_unresolved;
        let results = pool.run(tasks.clone(), &factory, |extractor, task: RekeyTask| {
            rekey_file(&task.input(input_dir), &task.output(output_dir), extractor, policy)
        });

        // ── Step 5: Statistics ────────────────────────────────────────────────
        let mut summary = FileStats::new("total");
        let mut errors  = 0usize;
        for (task, result) in tasks.iter().zip(results) {
            match result {
                Ok(stats) => {
                    stats_log.log(&stats)?;
                    summary.absorb(&stats);
                }
                Err(e) => {
                    tracing::error!("Failed to re-key '{}/{}': {:#}", task.subdir, task.file, e);
                    errors += 1;
                }
            }
        }

        tracing::info!(
            "Re-keyed {} files: {} written, {} skipped, {} failed lines, {} failed files",
            tasks.len(),
            summary.written,
            summary.skipped,
            summary.failed,
            errors
        );
        Ok(summary)
    }
}
