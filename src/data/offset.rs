// ============================================================
// Layer 4 — Offset Reconciler
// ============================================================
// Links positions in a punctuation-stripped caption back to
// the caption as authored.
//
// Algorithm (two cursors):
//   walk every origin char; if it equals the next unmatched
//   normalized char, consume both and record the running
//   deletion count for that normalized char; otherwise the
//   origin char was deleted, so bump the count.
//
//   origin     = "hi, you!"
//   normalized = "hi you"
//   offsets    = [0, 0, 1, 1, 1, 1]
//
// Both failure modes are hard errors, never truncation:
//   - origin shorter than normalized
//   - normalized is not a subsequence of origin
//
// Reference: Rust Book §8 (Strings), §9 (Error Handling)

use crate::domain::caption::{Caption, OffsetMap};
use crate::error::{GroundingError, Result};

/// Characters removed by `remove_punctuation`.
pub const PUNCTUATION: &[char] = &[
    '|', ':', ';', '@', '(', ')', '[', ']', '{', '}', '^', '\\', '/',
    '\'', '"', '’', '`', '?', '$', '%', '#', '!', '&', '*', '+', ',', '.',
];

/// Delete every PUNCTUATION char and trim surrounding whitespace.
pub fn remove_punctuation(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !PUNCTUATION.contains(c)).collect();
    stripped.trim().to_string()
}

/// Build the normalized-indexed offset map between `normalized`
/// and the `origin` it was derived from by deleting chars.
pub fn compute_offset_map(normalized: &str, origin: &str) -> Result<OffsetMap> {
    let norm: Vec<char> = normalized.chars().collect();
    let orig_len        = origin.chars().count();

    if orig_len < norm.len() {
        return Err(GroundingError::invariant(format!(
            "origin {origin:?} ({orig_len} chars) is shorter than normalized {normalized:?} ({} chars)",
            norm.len()
        )));
    }

    let mut offsets = Vec::with_capacity(norm.len());
    let mut deleted = 0usize;

    for c in origin.chars() {
        if offsets.len() < norm.len() && c == norm[offsets.len()] {
            offsets.push(deleted);
        } else {
            deleted += 1;
        }
    }

    if offsets.len() != norm.len() {
        return Err(GroundingError::invariant(format!(
            "normalized {normalized:?} is not obtainable from origin {origin:?} by deletion \
             (matched {} of {} chars)",
            offsets.len(),
            norm.len()
        )));
    }

    Ok(OffsetMap::from_offsets(offsets))
}

/// Strip punctuation from `origin` and reconcile the two forms.
pub fn reconcile(origin: &str) -> Result<Caption> {
    let normalized = remove_punctuation(origin);
    let offsets    = compute_offset_map(&normalized, origin)?;
    Ok(Caption::from_parts(origin.to_string(), normalized, offsets))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_identical_strings_have_zero_offsets() {
        let map = compute_offset_map("abc", "abc").unwrap();
        assert_eq!(map, OffsetMap::from_offsets(vec![0, 0, 0]));
    }

    #[test]
    fn test_deleted_punctuation_shifts_following_chars() {
        let map = compute_offset_map("hi you", "hi, you!").unwrap();
        assert_eq!(map, OffsetMap::from_offsets(vec![0, 0, 1, 1, 1, 1]));
        assert_eq!(map.origin_index(3), Some(4));
    }

    #[test]
    fn test_leading_deletions_count() {
        let map = compute_offset_map("dog", "(dog)").unwrap();
        assert_eq!(map, OffsetMap::from_offsets(vec![1, 1, 1]));
    }

    #[test]
    fn test_shorter_origin_is_invariant_violation() {
        let err = compute_offset_map("abcd", "abc").unwrap_err();
        assert!(matches!(err, GroundingError::InvariantViolation(_)));
    }

    #[test]
    fn test_non_subsequence_is_invariant_violation() {
        let err = compute_offset_map("abz", "abcd").unwrap_err();
        assert!(matches!(err, GroundingError::InvariantViolation(_)));
    }

    #[test]
    fn test_multibyte_chars_index_by_char() {
        // ’ is three bytes in UTF-8 but one char
        let caption = reconcile("the cat’s toy").unwrap();
        assert_eq!(caption.normalized(), "the cats toy");
        assert_eq!(caption.offsets().origin_index(6), Some(6));
        // 's' of "cats" sits after the deleted apostrophe
        assert_eq!(caption.offsets().origin_index(7), Some(8));
    }

    #[test]
    fn test_remove_punctuation_trims() {
        assert_eq!(remove_punctuation("  (a dog).  "), "a dog");
        assert_eq!(remove_punctuation("!!!"), "");
    }

    #[test]
    fn test_random_deletions_keep_offsets_monotonic_and_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        let alphabet: Vec<char> = "ab c,.!d".chars().collect();

        for _ in 0..200 {
            let len: usize     = rng.gen_range(0..40);
            let origin: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();

            // Keep a random subsequence and remember where each kept char came from
            let mut normalized = String::new();
            let mut sources    = Vec::new();
            for (i, c) in origin.chars().enumerate() {
                if rng.gen_bool(0.6) {
                    normalized.push(c);
                    sources.push(i);
                }
            }

            let map = compute_offset_map(&normalized, &origin).unwrap();
            let count = normalized.chars().count();
            assert!(map.get(count).is_none());
            assert!((1..count).all(|n| map.get(n - 1) <= map.get(n)));

            let origin_chars: Vec<char> = origin.chars().collect();
            for (n, c) in normalized.chars().enumerate() {
                let o = map.origin_index(n).unwrap();
                assert_eq!(origin_chars[o], c);
                assert!(o <= sources[n]);
            }
        }
    }
}
