use thiserror::Error;

pub type Result<T> = std::result::Result<T, TagError>;

/// Errors raised by the tag store and the operations built on it.
///
/// The text functions (normalization, tokenization, distance, similarity)
/// never fail and do not use this type.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("tag not found: {0}")]
    TagNotFound(String),
    #[error("tag already exists: {0}")]
    TagAlreadyExists(String),
    #[error("a tag cannot be its own parent: {0}")]
    SelfParent(String),
    #[error("setting {parent} as parent of {child} would create a cycle")]
    HierarchyCycle { child: String, parent: String },
    #[error("alias cannot be empty")]
    EmptyAlias,
    #[error("merge record not found: {0}")]
    MergeNotFound(String),
    #[error("merge {0} has already been undone")]
    MergeAlreadyUndone(String),
    #[error("merge {0} has no snapshot to undo from")]
    MissingSnapshot(String),
    #[error("unknown tag kind: {0}")]
    UnknownKind(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("merge snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
