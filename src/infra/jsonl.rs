// ============================================================
// Layer 6 — JSON Lines Files
// ============================================================
// Reading and append-writing of newline-delimited JSON, the
// on-disk format of grounding records, manifests, alignment
// output and error logs.
//
// Reading keeps going past bad lines: every line comes back as
// its own Result, so callers decide per line whether a parse
// failure is fatal, skipped or routed to an error file.
//
// Writing is append-only. Each output path is owned by exactly
// one worker for the whole run.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// One parsed line with its 1-based line number.
pub struct Line<T> {
    pub number: usize,
    pub raw:    String,
    pub value:  Result<T>,
}

/// Read every non-blank line of `path` as JSON.
pub fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<Line<T>>> {
    let file = File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))?;

    let mut lines = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let raw = line.with_context(|| format!("Cannot read line {} of '{}'", i + 1, path.display()))?;
        if raw.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON on line {} of '{}'", i + 1, path.display()));
        lines.push(Line { number: i + 1, raw, value });
    }
    Ok(lines)
}

/// Delete `path` when it exists; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Cannot remove '{}'", path.display())),
    }
}

// ─── JsonlWriter ──────────────────────────────────────────────────────────────
/// Appends JSON values to a file, one per line.
pub struct JsonlWriter {
    path:    PathBuf,
    out:     BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn append(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create '{}'", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open '{}' for appending", path.display()))?;

        Ok(Self { path, out: BufWriter::new(file), written: 0 })
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.path.display()))?;
        Ok(self.written)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_write_then_read_back() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");

        let mut w = JsonlWriter::append(&path).unwrap();
        w.write(&json!({"a": 1})).unwrap();
        w.write(&json!({"a": 2})).unwrap();
        assert_eq!(w.finish().unwrap(), 2);

        let lines: Vec<Line<Value>> = read_lines(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].value.as_ref().unwrap()["a"], 2);
    }

    #[test]
    fn test_append_keeps_existing_lines() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        for i in 0..2 {
            let mut w = JsonlWriter::append(&path).unwrap();
            w.write(&json!({ "run": i })).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(read_lines::<Value>(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_bad_lines_are_reported_per_line() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.jsonl");
        fs::write(&path, "{\"ok\": true}\n\nnot json\n{\"ok\": false}\n").unwrap();

        let lines: Vec<Line<Value>> = read_lines(&path).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].value.is_ok());
        assert!(lines[1].value.is_err());
        assert_eq!(lines[1].number, 3);
        assert!(lines[2].value.is_ok());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jsonl");
        assert!(remove_if_exists(&path).is_ok());
        fs::write(&path, "x").unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
