// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the sub-word tokenizer used to build positive maps and
// adapts its encodings to the TokenAligner seam.
//
// Production runs point at the language backbone's
// tokenizer.json. When none exists, a word-level tokenizer
// is built from the captions themselves and written next to
// the outputs so later runs reuse the same vocabulary.
//
// Offsets: captions are encoded with char offsets (not byte
// offsets) so that char_to_token agrees with the char spans
// produced by the extractor and the offset map.

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::{Encoding, Tokenizer};

use crate::domain::traits::TokenAligner;
use crate::error::GroundingError;

// ─── EncodedCaption ───────────────────────────────────────────────────────────
/// A caption encoded with special tokens and char offsets.
pub struct EncodedCaption {
    encoding: Encoding,
    char_len: usize,
}

impl EncodedCaption {
    pub fn encode(tokenizer: &Tokenizer, caption: &str) -> crate::error::Result<Self> {
        let encoding = tokenizer
            .encode_char_offsets(caption, true)
            .map_err(|e| GroundingError::Tokenizer(e.to_string()))?;
        Ok(Self { encoding, char_len: caption.chars().count() })
    }

    pub fn token_count(&self) -> usize {
        self.encoding.len()
    }
}

impl TokenAligner for EncodedCaption {
    fn char_to_token(&self, char_index: usize) -> Option<usize> {
        self.encoding.char_to_token(char_index, 0)
    }

    fn text_len(&self) -> usize {
        self.char_len
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load an existing tokenizer or build a word-level one from `texts`.
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::warn!(
                "No tokenizer at '{}', building a word-level one (vocab_size={})",
                self.path().display(),
                vocab_size
            );
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Write a WordLevel tokenizer JSON built from word frequencies
    /// and load it back.
    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split(|c: char| !c.is_alphanumeric()) {
                if !word.is_empty() {
                    *freq.entry(word.to_lowercase()).or_insert(0) += 1;
                }
            }
        }

        // Most frequent first; ties broken alphabetically so the
        // vocabulary does not depend on HashMap iteration order
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(5));

        let mut vocab = serde_json::json!({
            "[PAD]":  0,
            "[UNK]":  1,
            "[CLS]":  2,
            "[SEP]":  3,
            "[MASK]": 4,
        });
        for (id, (word, _)) in words.iter().enumerate() {
            vocab[word] = serde_json::json!(id + 5);
        }

        let special = |id: usize, content: &str| serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        });

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                special(0, "[PAD]"), special(1, "[UNK]"), special(2, "[CLS]"),
                special(3, "[SEP]"), special(4, "[MASK]")
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [
                    { "SpecialToken": { "id": "[CLS]", "type_id": 0 } },
                    { "Sequence":     { "id": "A",     "type_id": 0 } },
                    { "SpecialToken": { "id": "[SEP]", "type_id": 0 } }
                ],
                "pair": [
                    { "SpecialToken": { "id": "[CLS]", "type_id": 0 } },
                    { "Sequence":     { "id": "A",     "type_id": 0 } },
                    { "SpecialToken": { "id": "[SEP]", "type_id": 0 } },
                    { "Sequence":     { "id": "B",     "type_id": 1 } },
                    { "SpecialToken": { "id": "[SEP]", "type_id": 1 } }
                ],
                "special_tokens": {
                    "[CLS]": { "id": "[CLS]", "ids": [2], "tokens": ["[CLS]"] },
                    "[SEP]": { "id": "[SEP]", "ids": [3], "tokens": ["[SEP]"] }
                }
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!("Tokenizer built with {} words, saved to '{}'", words.len(), path.display());
        self.load()
    }
}
