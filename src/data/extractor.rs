// ============================================================
// Layer 4 — Rule-Based Noun Chunker
// ============================================================
// A lightweight PhraseExtractor for environments without an
// NLP model. It approximates noun chunks from word classes:
//
//   determiner   → starts a new chunk and is kept in it
//   pronoun      → emitted as a chunk of its own
//   function word, interjection, -ly adverb,
//   punctuation  → closes the open chunk
//   verb         → closes the open chunk, unless only a
//                  determiner is open ("the falls")
//   -ing / -ed   → modifier while the chunk has no noun yet
//                  ("a smiling woman"), closer after one
//                  ("a man riding a horse")
//   anything else → noun content, extends the open chunk
//
//   "a dog runs on the green grass, it barks"
//     → ["a dog", "the green grass", "it"]
//
// A chunk is only emitted once it holds noun content, so a
// caption like "wow" or "so pretty" yields no phrases and the
// normalizer falls back to the whole caption.
//
// The word lists are deliberately small; callers that need
// proper parsing plug a model-backed PhraseExtractor in.

use anyhow::Result;

use crate::domain::{entity::ExtractedPhrase, traits::PhraseExtractor};

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "my", "your", "his",
    "her", "its", "our", "their", "some", "many", "several", "two", "three",
    "four", "five", "each", "every",
];

const PRONOUNS: &[&str] = &[
    "i", "me", "you", "he", "him", "she", "it", "we", "us", "they", "them",
    "who", "what", "there", "something", "someone", "everyone",
];

const FUNCTION_WORDS: &[&str] = &[
    // prepositions
    "in", "on", "at", "of", "for", "with", "without", "by", "from", "to",
    "into", "onto", "over", "under", "above", "below", "near", "behind",
    "between", "through", "during", "against", "across", "around", "about",
    "along", "beside", "inside", "outside", "up", "down", "off", "out",
    // conjunctions
    "and", "or", "but", "nor", "so", "yet", "while", "as", "than", "if",
    // auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "am", "has", "have",
    "had", "do", "does", "did", "can", "could", "will", "would", "shall",
    "should", "may", "might", "must",
    // other
    "not", "no", "very", "also", "just", "only", "then", "when", "where",
    "how", "why", "which", "whose", "too", "really", "quite",
];

/// Verb forms frequent in image captions. Most double as nouns
/// ("the falls", "a ride"), so right after a bare determiner they
/// count as noun content. Unlisted -ing/-ed forms are caught by
/// suffix in `classify`.
const VERBS: &[&str] = &[
    "run", "runs", "sit", "sits", "stand", "stands", "hold", "holds",
    "look", "looks", "wear", "wears", "show", "shows", "play", "plays",
    "walk", "walks", "lie", "lies", "bark", "barks", "jump", "jumps",
    "eat", "eats", "fly", "flies", "swim", "swims", "sleep", "sleeps",
    "ride", "rides", "wait", "waits", "hang", "hangs", "grow", "grows",
    "smile", "smiles", "pose", "poses", "lean", "leans", "climb", "climbs",
    "drive", "drives", "read", "reads", "carry", "carries", "throw",
    "throws", "catch", "catches", "kick", "kicks", "open", "opens",
    "cover", "covers", "contain", "contains", "feature", "features",
    "include", "includes", "appear", "appears", "move", "moves", "fall",
    "falls", "make", "makes", "take", "takes", "give", "gives", "watch",
    "watches", "use", "uses", "cross", "crosses", "chase", "chases",
    "float", "floats", "rest", "rests", "lay", "lays", "get", "gets",
    "go", "goes", "come", "comes", "see", "sees", "love", "loves",
    "sat", "stood", "held", "wore", "ran", "ate", "flew",
];

const INTERJECTIONS: &[&str] = &[
    "wow", "oh", "ooh", "ah", "aww", "omg", "lol", "yay", "hey", "hi",
    "hello", "yes", "yeah", "ok", "okay", "please", "thanks", "welcome",
];

/// Nouns that look like participles or -ly adverbs.
const SUFFIX_NOUNS: &[&str] = &[
    "building", "buildings", "painting", "paintings", "ceiling", "clothing",
    "wedding", "morning", "evening", "string", "spring", "swing", "thing",
    "things", "king", "ring", "wing", "wings", "sibling", "pudding",
    "railing", "awning", "bedding", "icing", "offspring", "hundred",
    "family", "butterfly", "dragonfly", "jelly", "belly", "lily", "holly",
    "rally", "italy",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum WordClass {
    Determiner,
    Pronoun,
    Function,
    Verb,
    Participle,
    Content,
}

fn classify(word: &str) -> WordClass {
    let lower = word.to_lowercase();
    let lower = lower.as_str();
    let long  = lower.chars().count() > 4;

    if DETERMINERS.contains(&lower) {
        WordClass::Determiner
    } else if PRONOUNS.contains(&lower) {
        WordClass::Pronoun
    } else if FUNCTION_WORDS.contains(&lower) || INTERJECTIONS.contains(&lower) {
        WordClass::Function
    } else if VERBS.contains(&lower) {
        WordClass::Verb
    } else if SUFFIX_NOUNS.contains(&lower) {
        WordClass::Content
    } else if long && lower.ends_with("ly") {
        WordClass::Function
    } else if long && (lower.ends_with("ing") || lower.ends_with("ed")) {
        WordClass::Participle
    } else {
        WordClass::Content
    }
}

/// Function-word delimited noun chunker.
#[derive(Debug, Clone, Default)]
pub struct RuleChunker;

impl RuleChunker {
    pub fn new() -> Self {
        Self
    }
}

/// A word with char bounds; `gap_before` is true when anything
/// other than plain spaces separates it from the previous word.
struct Word {
    begin:      usize,
    end:        usize,
    gap_before: bool,
}

fn split_words(chars: &[char]) -> Vec<Word> {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '-' || c == '\'';

    let mut words = Vec::new();
    let mut i     = 0usize;
    let mut gap   = false;

    while i < chars.len() {
        let c = chars[i];
        if is_word_char(c) {
            let begin = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            words.push(Word { begin, end: i, gap_before: gap });
            gap = false;
        } else {
            if !c.is_whitespace() {
                gap = true;
            }
            i += 1;
        }
    }
    words
}

impl PhraseExtractor for RuleChunker {
    fn noun_phrases(&self, text: &str) -> Result<Vec<ExtractedPhrase>> {
        let chars: Vec<char> = text.chars().collect();
        let slice = |b: usize, e: usize| chars[b..e].iter().collect::<String>();

        let mut phrases = Vec::new();
        // (begin, end, has_content) of the chunk being built
        let mut open: Option<(usize, usize, bool)> = None;

        let close = |open: &mut Option<(usize, usize, bool)>, phrases: &mut Vec<ExtractedPhrase>| {
            if let Some((b, e, true)) = open.take() {
                phrases.push(ExtractedPhrase::new(slice(b, e), b, e));
            }
        };

        for word in split_words(&chars) {
            if word.gap_before {
                close(&mut open, &mut phrases);
            }
            match classify(&slice(word.begin, word.end)) {
                WordClass::Determiner => {
                    close(&mut open, &mut phrases);
                    open = Some((word.begin, word.end, false));
                }
                WordClass::Pronoun => {
                    close(&mut open, &mut phrases);
                    phrases.push(ExtractedPhrase::new(slice(word.begin, word.end), word.begin, word.end));
                }
                WordClass::Function => close(&mut open, &mut phrases),
                WordClass::Verb => match open {
                    Some((b, _, false)) => open = Some((b, word.end, true)),
                    _                   => close(&mut open, &mut phrases),
                },
                WordClass::Participle => match open {
                    Some((_, _, true))  => close(&mut open, &mut phrases),
                    Some((b, _, false)) => open = Some((b, word.end, false)),
                    None                => open = Some((word.begin, word.end, false)),
                },
                WordClass::Content => {
                    open = Some(match open {
                        Some((b, _, _)) => (b, word.end, true),
                        None            => (word.begin, word.end, true),
                    });
                }
            }
        }
        close(&mut open, &mut phrases);

        Ok(phrases)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        RuleChunker::new()
            .noun_phrases(text)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect()
    }

    #[test]
    fn test_chunks_split_on_function_words() {
        assert_eq!(
            texts("a dog runs on the green grass, it barks"),
            vec!["a dog", "the green grass", "it"]
        );
    }

    #[test]
    fn test_spans_are_char_offsets() {
        let phrases = RuleChunker::new().noun_phrases("café sign and a tree").unwrap();
        assert_eq!(phrases[0].text, "café sign");
        assert_eq!((phrases[0].begin, phrases[0].end), (0, 9));
        assert_eq!(phrases[1].text, "a tree");
        assert_eq!((phrases[1].begin, phrases[1].end), (14, 20));
    }

    #[test]
    fn test_lone_determiner_is_not_a_chunk() {
        assert!(texts("the").is_empty());
        assert!(texts("").is_empty());
    }

    #[test]
    fn test_punctuation_closes_chunk() {
        assert_eq!(texts("sunset. beach"), vec!["sunset", "beach"]);
    }

    #[test]
    fn test_interjections_and_adverbs_are_not_chunks() {
        assert!(texts("wow").is_empty());
        assert!(texts("Wow, just wow!").is_empty());
        assert!(texts("absolutely").is_empty());
    }

    #[test]
    fn test_verb_after_noun_closes_chunk() {
        assert_eq!(texts("a dog jumps over the fence"), vec!["a dog", "the fence"]);
        assert_eq!(texts("two cats sleep on a sofa"), vec!["two cats", "a sofa"]);
    }

    #[test]
    fn test_participles_modify_or_close() {
        assert_eq!(texts("a man riding a horse"), vec!["a man", "a horse"]);
        assert_eq!(texts("a smiling woman"), vec!["a smiling woman"]);
        assert_eq!(texts("parked cars"), vec!["parked cars"]);
        assert!(texts("running").is_empty());
    }

    #[test]
    fn test_verb_after_bare_determiner_is_a_noun() {
        assert_eq!(texts("the falls at dusk"), vec!["the falls", "dusk"]);
    }

    #[test]
    fn test_suffix_nouns_stay_content() {
        assert_eq!(texts("a tall building"), vec!["a tall building"]);
        assert_eq!(texts("the family dinner"), vec!["the family dinner"]);
    }
}
