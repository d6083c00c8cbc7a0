// ============================================================
// Layer 4 — Caption Preprocessor
// ============================================================
// Cleans a raw web caption before noun-phrase extraction and
// tokenisation.
//
// Web captions often contain:
//   - Bracketed markup: (...), [...], {...}, 【...】, 「...」
//   - Math and markup operators: + = ^ * < > /
//   - Full-width variants of the above
//
// Each of these chars becomes a single space. Replacing rather
// than deleting keeps every other char at its original index,
// so spans found in the cleaned caption are valid in the raw
// one too.
//
// Reference: Rust Book §8 (Strings in Rust)

/// Characters replaced with a space.
const MARKUP: &[char] = &[
    '+', '=', '^', '*', '<', '>', '{', '}', '「', '」', '【', '】',
    '(', ')', '（', '）', '/', '\\', '[', ']',
];

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Replace markup chars with spaces; char count is preserved.
    pub fn clean(&self, caption: &str) -> String {
        caption
            .chars()
            .map(|c| if MARKUP.contains(&c) { ' ' } else { c })
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
