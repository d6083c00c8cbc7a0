// ============================================================
// Layer 4 — Entity Normalizer
// ============================================================
// Turns the raw noun phrases of one caption into a clean,
// uniquely-named entity list.
//
// Steps (applied in order):
//   1. Drop phrases the exclusion predicate rejects
//      (pronouns and vague referents: "it", "there", "who")
//   2. Optionally lowercase phrase text
//   3. If nothing is left, the whole caption becomes the single
//      entity and `empty_nouns` is set
//   4. Rename repeats per phrase text, in extraction order:
//        ["cat", "dog", "cat"] → ["cat", "dog", "cat-1"]
//
// Names are unique within a sample even when the extractor
// itself produced a literal "cat-1".

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{
    entity::{ExtractedPhrase, NormalizedEntities},
    span::Span,
};

/// Phrases never treated as grounding targets.
pub const DEFAULT_EXCLUDED: &[&str] = &[
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves",
    "he", "him", "his", "she", "her", "hers", "we", "us", "our", "you", "your",
    "i", "me", "my", "mine", "this", "that", "these", "those", "there", "here",
    "who", "whom", "whose", "which", "what", "something", "anything",
    "everything", "nothing", "someone", "anyone", "everyone", "one",
];

// ─── ExclusionVocabulary ──────────────────────────────────────────────────────
/// Case-insensitive whole-phrase match against a fixed word list.
#[derive(Debug, Clone)]
pub struct ExclusionVocabulary {
    words: HashSet<String>,
}

impl ExclusionVocabulary {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.words.contains(&phrase.trim().to_lowercase())
    }
}

impl Default for ExclusionVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED.iter())
    }
}

// ─── EntityNormalizer ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EntityNormalizer {
    vocabulary: ExclusionVocabulary,
    lowercase:  bool,
}

impl EntityNormalizer {
    pub fn new(vocabulary: ExclusionVocabulary, lowercase: bool) -> Self {
        Self { vocabulary, lowercase }
    }

    /// Normalize the phrases extracted from `caption`. The type
    /// parameter names the coordinate system both share.
    pub fn normalize<C>(&self, caption: &str, phrases: &[ExtractedPhrase]) -> NormalizedEntities<C> {
        normalize_entities(caption, phrases, |p| self.vocabulary.contains(p), self.lowercase)
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new(ExclusionVocabulary::default(), true)
    }
}

/// Filter, rename and index the phrases of one caption.
pub fn normalize_entities<C, F>(
    caption:   &str,
    phrases:   &[ExtractedPhrase],
    exclude:   F,
    lowercase: bool,
) -> NormalizedEntities<C>
where
    F: Fn(&str) -> bool,
{
    let fold = |text: &str| if lowercase { text.to_lowercase() } else { text.to_string() };

    let mut kept: Vec<(String, Span<C>)> = phrases
        .iter()
        .filter(|p| !exclude(&p.text))
        .map(|p| (fold(&p.text), Span::new(p.begin, p.end)))
        .collect();

    let empty_nouns = kept.is_empty();
    if empty_nouns {
        tracing::debug!("No entities found, using caption as entity: {:?}", caption);
        kept.push((fold(caption), Span::new(0, caption.chars().count())));
    }

    let mut entities    = Vec::with_capacity(kept.len());
    let mut new_to_old  = BTreeMap::new();
    let mut new_to_span = BTreeMap::new();
    let mut taken       = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();

    for (phrase, span) in kept {
        let count = repeats.entry(phrase.clone()).or_insert(0);
        let mut name = if *count == 0 { phrase.clone() } else { format!("{phrase}-{count}") };
        while taken.contains(&name) {
            *count += 1;
            name = format!("{phrase}-{count}");
        }
        *count += 1;

        taken.insert(name.clone());
        new_to_old.insert(name.clone(), phrase);
        new_to_span.insert(name.clone(), span);
        entities.push(name);
    }

    NormalizedEntities { entities, new_to_old, new_to_span, empty_nouns }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::span::Origin;

    fn phrase(text: &str, begin: usize) -> ExtractedPhrase {
        ExtractedPhrase::new(text, begin, begin + text.chars().count())
    }

    #[test]
    fn test_duplicates_get_numbered_suffixes() {
        let phrases = [phrase("cat", 0), phrase("dog", 8), phrase("cat", 16)];
        let out: NormalizedEntities<Origin> =
            EntityNormalizer::default().normalize("cat and dog and cat", &phrases);

        assert_eq!(out.entities, vec!["cat", "dog", "cat-1"]);
        assert_eq!(out.new_to_old["cat"], "cat");
        assert_eq!(out.new_to_old["dog"], "dog");
        assert_eq!(out.new_to_old["cat-1"], "cat");
        assert_eq!(out.new_to_span["cat-1"].begin, 16);
        assert!(!out.empty_nouns);
    }

    #[test]
    fn test_suffix_counter_is_per_phrase() {
        let phrases = [
            phrase("cat", 0), phrase("dog", 4), phrase("dog", 8), phrase("cat", 12), phrase("dog", 16),
        ];
        let out: NormalizedEntities<Origin> =
            normalize_entities("cat dog dog cat dog", &phrases, |_| false, false);
        assert_eq!(out.entities, vec!["cat", "dog", "dog-1", "cat-1", "dog-2"]);
    }

    #[test]
    fn test_literal_suffix_collision_stays_unique() {
        let phrases = [phrase("cat", 0), phrase("cat", 4), phrase("cat-1", 8)];
        let out: NormalizedEntities<Origin> =
            normalize_entities("cat cat cat-1", &phrases, |_| false, false);
        assert_eq!(out.entities, vec!["cat", "cat-1", "cat-1-1"]);
        assert_eq!(out.new_to_old["cat-1-1"], "cat-1");
        assert_eq!(out.new_to_old.len(), 3);
        assert_eq!(out.new_to_span.len(), 3);
    }

    #[test]
    fn test_excluded_phrases_are_dropped() {
        let phrases = [phrase("It", 0), phrase("a red ball", 7), phrase("who", 18)];
        let out: NormalizedEntities<Origin> =
            EntityNormalizer::default().normalize("It is a red ball, who knows", &phrases);
        assert_eq!(out.entities, vec!["a red ball"]);
    }

    #[test]
    fn test_no_phrases_falls_back_to_whole_caption() {
        let out: NormalizedEntities<Origin> = EntityNormalizer::default().normalize("wow", &[]);
        assert_eq!(out.entities, vec!["wow"]);
        assert_eq!(out.new_to_span["wow"], Span::new(0, 3));
        assert!(out.empty_nouns);
    }

    #[test]
    fn test_only_excluded_phrases_falls_back() {
        let out: NormalizedEntities<Origin> =
            EntityNormalizer::default().normalize("There It", &[phrase("There", 0), phrase("It", 6)]);
        assert_eq!(out.entities, vec!["there it"]);
        assert!(out.empty_nouns);
    }

    #[test]
    fn test_lowercase_is_optional() {
        let phrases = [phrase("Red Car", 0)];
        let kept: NormalizedEntities<Origin> = normalize_entities("Red Car", &phrases, |_| false, false);
        assert_eq!(kept.entities, vec!["Red Car"]);
        let folded: NormalizedEntities<Origin> = normalize_entities("Red Car", &phrases, |_| false, true);
        assert_eq!(folded.entities, vec!["red car"]);
    }

    #[test]
    fn test_token_groups_follow_entity_order() {
        let phrases = [phrase("dog", 4), phrase("cat", 0)];
        let out: NormalizedEntities<Origin> = normalize_entities("cat dog", &phrases, |_| false, true);
        let groups = out.token_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![Span::new(4, 7)]);
        assert_eq!(groups[1], vec![Span::new(0, 3)]);
        assert_eq!(out.new_to_old["cat"], "cat");
    }
}
