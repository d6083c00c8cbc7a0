// ============================================================
// Layer 4 — Positive Map Builder
// ============================================================
// Aligns entity spans (chars) to tokenizer slots (tokens).
//
// For every group (one row) and every span [begin, end) in it:
//
//   first = char_to_token(begin)   retry begin+1, begin+2
//   last  = char_to_token(end - 1) retry end-2,   end-3
//
// Tokenizers leave whitespace and stripped punctuation without
// a token, so a span that starts or ends on one of those chars
// misses the exact lookup. The retries nudge the probe inward.
// If either side still misses, that span adds nothing.
//
// Otherwise columns first..=last (clipped to the slot width)
// are set to 1, and finally every row is divided by
// (row_sum + 1e-6): empty rows stay 0, others sum to ~1.
//
// A span outside the caption is an upstream extraction bug
// and fails the whole sample with GroundingError::Alignment.

use crate::domain::{positive_map::PositiveMap, span::Span, traits::TokenAligner};
use crate::error::{GroundingError, Result};

/// Token slots per positive-map row.
pub const DEFAULT_SLOT_WIDTH: usize = 256;

const ROW_EPSILON: f32 = 1e-6;

/// Build a `(token_groups.len(), slot_width)` positive map.
///
/// `caption` is only used to describe failures; spans are
/// checked against `tokenized.text_len()`.
pub fn build_positive_map<T, C>(
    tokenized:    &T,
    caption:      &str,
    token_groups: &[Vec<Span<C>>],
    slot_width:   usize,
) -> Result<PositiveMap>
where
    T: TokenAligner + ?Sized,
{
    let text_len = tokenized.text_len();
    let mut map  = PositiveMap::zeros(token_groups.len(), slot_width);

    for (row, group) in token_groups.iter().enumerate() {
        for span in group {
            if span.begin > span.end || span.end > text_len {
                return Err(GroundingError::Alignment {
                    begin:   span.begin,
                    end:     span.end,
                    caption: caption.to_string(),
                });
            }
            if span.is_empty() {
                continue;
            }

            let (Some(first), Some(last)) = (
                first_token(tokenized, span.begin, text_len),
                last_token(tokenized, span.end),
            ) else {
                tracing::trace!("span {} has no token boundary in {:?}, skipped", span, caption);
                continue;
            };

            if first >= slot_width || first > last {
                continue;
            }
            let last = last.min(slot_width - 1);
            map.row_mut(row)[first..=last].fill(1.0);
        }
    }

    for row in 0..map.rows() {
        let denom = map.row_sum(row) + ROW_EPSILON;
        map.row_mut(row).iter_mut().for_each(|v| *v /= denom);
    }

    Ok(map)
}

fn first_token<T: TokenAligner + ?Sized>(tokenized: &T, begin: usize, text_len: usize) -> Option<usize> {
    (begin..begin + 3)
        .filter(|&c| c < text_len)
        .find_map(|c| tokenized.char_to_token(c))
}

fn last_token<T: TokenAligner + ?Sized>(tokenized: &T, end: usize) -> Option<usize> {
    (1..=3)
        .filter_map(|back| end.checked_sub(back))
        .find_map(|c| tokenized.char_to_token(c))
}
