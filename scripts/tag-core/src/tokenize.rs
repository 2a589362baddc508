use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// English and French function words ignored when comparing token sets.
pub const STOP_WORDS: &[&str] = &[
    "et", "and", "&", "le", "la", "les", "the", "a", "an", "de", "of", "in", "en",
];

// Anything outside ASCII word characters and whitespace is dropped, which
// also drops accented and CJK letters.
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s]").unwrap());

/// Which tokenizer the similarity engine feeds its Jaccard tier with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    #[default]
    Ascii,
    Unicode,
}

impl TokenizerMode {
    pub fn tokenize(self, name: &str) -> BTreeSet<String> {
        match self {
            TokenizerMode::Ascii => tokenize(name),
            TokenizerMode::Unicode => tokenize_unicode(name),
        }
    }
}

/// Splits a tag name into its set of lowercase word tokens, stop words removed.
///
/// ASCII-oriented: `"café"` yields `"caf"` and CJK text yields nothing.
/// Similarity thresholds are tuned against this behavior; use
/// [`tokenize_unicode`] for broader language support.
pub fn tokenize(name: &str) -> BTreeSet<String> {
    let lowered = name.to_lowercase();
    let cleaned = NON_WORD_RE.replace_all(&lowered, "");
    collect_tokens(&cleaned)
}

/// Unicode-aware variant of [`tokenize`]: accents are folded (`"café"` ->
/// `"cafe"`) and any alphanumeric script survives.
pub fn tokenize_unicode(name: &str) -> BTreeSet<String> {
    let folded: String = name
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect::<String>()
        .to_lowercase();
    let cleaned: String = folded
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_' || ch.is_whitespace())
        .collect();
    collect_tokens(&cleaned)
}

fn collect_tokens(cleaned: &str) -> BTreeSet<String> {
    cleaned
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}
