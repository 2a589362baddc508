use crate::distance::levenshtein_distance;
use crate::normalize::normalize;
use crate::tokenize::TokenizerMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MAX_EDITS: usize = 1;
pub const DEFAULT_LONG_NAME_MAX_EDITS: usize = 2;
pub const DEFAULT_LONG_NAME_MIN_LEN: usize = 6;
pub const DEFAULT_JACCARD_THRESHOLD: f64 = 0.80;

/// Thresholds used by [`are_tags_similar_with`].
///
/// The default reproduces [`are_tags_similar`]: one edit for any name, two
/// edits once the longer normalized name has more than five characters, and
/// a Jaccard ratio of at least 0.8 over ASCII tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityPolicy {
    pub max_edits: usize,
    pub long_name_max_edits: usize,
    pub long_name_min_len: usize,
    pub jaccard_threshold: f64,
    pub tokenizer: TokenizerMode,
}

impl Default for SimilarityPolicy {
    fn default() -> Self {
        Self {
            max_edits: DEFAULT_MAX_EDITS,
            long_name_max_edits: DEFAULT_LONG_NAME_MAX_EDITS,
            long_name_min_len: DEFAULT_LONG_NAME_MIN_LEN,
            jaccard_threshold: DEFAULT_JACCARD_THRESHOLD,
            tokenizer: TokenizerMode::Ascii,
        }
    }
}

/// Intersection over union of two token sets. Empty on either side gives 0.
pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

pub fn are_tokens_similar(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    are_tokens_similar_at(a, b, DEFAULT_JACCARD_THRESHOLD)
}

fn are_tokens_similar_at(a: &BTreeSet<String>, b: &BTreeSet<String>, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    jaccard_similarity(a, b) >= threshold
}

/// Whether two tag names look like variants of one another.
///
/// Plurals and typos are caught by edit distance on the normalized names;
/// reordered words and stop-word differences by token overlap on the raw
/// names. This is a pairwise hint and is not transitive.
pub fn are_tags_similar(name1: &str, name2: &str) -> bool {
    are_tags_similar_with(&SimilarityPolicy::default(), name1, name2)
}

pub fn are_tags_similar_with(policy: &SimilarityPolicy, name1: &str, name2: &str) -> bool {
    let norm1 = normalize(name1);
    let norm2 = normalize(name2);

    let distance = levenshtein_distance(&norm1, &norm2);
    let longest = norm1.chars().count().max(norm2.chars().count());
    if distance <= policy.max_edits
        || (distance <= policy.long_name_max_edits && longest >= policy.long_name_min_len)
    {
        return true;
    }

    let tokens1 = policy.tokenizer.tokenize(name1);
    let tokens2 = policy.tokenizer.tokenize(name2);
    are_tokens_similar_at(&tokens1, &tokens2, policy.jaccard_threshold)
}
