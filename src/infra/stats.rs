// ============================================================
// Layer 6 — Run Statistics Logger
// ============================================================
// Records per-file line counts of an offline run to a CSV file.
//
// Counts recorded per input file:
//   - read:    non-blank lines seen
//   - written: records emitted to the output
//   - skipped: records intentionally not emitted
//              (status != success, unresolved groundings
//              under the drop policy)
//   - failed:  lines that raised an error
//
// Output file: <out>/stats.csv
//
// Example CSV output:
//   file,read,written,skipped,failed
//   part-0000.jsonl,1000,987,12,1
//   "in/a,b/part-0001.jsonl",1000,1000,0,0
//
// Fields are quoted by the csv writer when needed, so paths
// containing commas keep their row intact.
//
// Invariant: read == written + skipped + failed.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
};

const HEADER: [&str; 5] = ["file", "read", "written", "skipped", "failed"];

/// Line counts of one processed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub file:    String,
    pub read:    usize,
    pub written: usize,
    pub skipped: usize,
    pub failed:  usize,
}

impl FileStats {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into(), ..Self::default() }
    }

    /// Add the counts of `other`, keeping this file name.
    pub fn absorb(&mut self, other: &FileStats) {
        self.read    += other.read;
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed  += other.failed;
    }
}

/// Appends FileStats rows to a CSV file.
pub struct StatsLogger {
    csv_path: PathBuf,
}

impl StatsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("stats.csv");
        if !csv_path.exists() {
            let mut wtr = csv::Writer::from_path(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            wtr.write_record(HEADER)?;
            wtr.flush()?;
            tracing::debug!("Created stats CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, s: &FileStats) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}' for appending", self.csv_path.display()))?;

        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        wtr.serialize(s)?;
        wtr.flush()?;

        tracing::debug!(
            "{}: read={} written={} skipped={} failed={}",
            s.file,
            s.read,
            s.written,
            s.skipped,
            s.failed
        );
        Ok(())
    }
}
