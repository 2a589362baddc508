//! Tag normalization, similarity detection and merging for a photo library.
//!
//! The text functions ([`normalize`], [`tokenize`], [`levenshtein_distance`],
//! [`are_tags_similar`]) are pure. Everything that touches tags, item links,
//! aliases or the merge history goes through a [`TagService`] wrapping an
//! injected [`TagStore`] ([`MemoryTagStore`] or [`SqliteTagStore`]).

mod alias;
mod distance;
mod error;
mod hierarchy;
mod merge;
mod model;
mod normalize;
mod service;
mod similarity;
mod sqlite;
mod store;
mod tokenize;

pub use distance::levenshtein_distance;
pub use error::{Result, TagError};
pub use model::{MergeSnapshot, Resolution, Tag, TagKind, TagMergeRecord, TagNode};
pub use normalize::normalize;
pub use service::TagService;
pub use similarity::{
    are_tags_similar, are_tags_similar_with, are_tokens_similar, jaccard_similarity,
    SimilarityPolicy,
};
pub use sqlite::SqliteTagStore;
pub use store::{MemoryTagStore, TagStore};
pub use tokenize::{tokenize, tokenize_unicode, TokenizerMode, STOP_WORDS};
