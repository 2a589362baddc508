use crate::error::TagError;
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of a tag: typed by a user, suggested by image analysis, or a
/// detailed analysis label carrying a confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Ai,
    Manual,
    AiDetailed,
}

impl TagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Ai => "ai",
            TagKind::Manual => "manual",
            TagKind::AiDetailed => "ai_detailed",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKind {
    type Err = TagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(TagKind::Ai),
            "manual" => Ok(TagKind::Manual),
            "ai_detailed" => Ok(TagKind::AiDetailed),
            other => Err(TagError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub kind: TagKind,
    pub confidence: Option<f64>,
    pub parent_id: Option<String>,
    pub created_at: i64,
}

impl Tag {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TagKind) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            normalized_name: normalize(&name),
            name,
            kind,
            confidence: None,
            parent_id: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// State captured right before a source tag is absorbed, enough to put it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSnapshot {
    pub source_items: Vec<String>,
    pub target_items: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

/// One entry of the append-only merge history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMergeRecord {
    pub id: String,
    pub target_tag_id: String,
    pub source_tag_id: String,
    pub source_tag_name: String,
    pub source_kind: TagKind,
    pub source_parent_id: Option<String>,
    pub source_confidence: Option<f64>,
    pub source_created_at: i64,
    pub merged_at: i64,
    pub snapshot: Option<MergeSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub tag: Tag,
    pub children: Vec<TagNode>,
}

/// How [`crate::TagService::resolve`] found a tag for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Alias(String),
    Exact(String),
    Similar(String),
}

impl Resolution {
    pub fn tag_id(&self) -> &str {
        match self {
            Resolution::Alias(id) | Resolution::Exact(id) | Resolution::Similar(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [TagKind::Ai, TagKind::Manual, TagKind::AiDetailed] {
            assert_eq!(kind.as_str().parse::<TagKind>().unwrap(), kind);
        }
        assert_eq!(" Manual ".parse::<TagKind>().unwrap(), TagKind::Manual);
        assert!(matches!("robot".parse::<TagKind>(), Err(TagError::UnknownKind(_))));
    }

    #[test]
    fn new_tag_is_normalized() {
        let tag = Tag::new("t1", "  Portraits ", TagKind::Manual);
        assert_eq!(tag.name, "  Portraits ");
        assert_eq!(tag.normalized_name, "portrait");
        assert!(tag.parent_id.is_none());
    }

    #[test]
    fn snapshot_json_uses_item_id_keys() {
        let snapshot = MergeSnapshot {
            source_items: vec!["item-A".into()],
            target_items: vec!["item-B".into()],
            ..MergeSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["sourceItems"][0], "item-A");
        assert_eq!(json["targetItems"][0], "item-B");
        let legacy: MergeSnapshot =
            serde_json::from_str(r#"{"sourceItems":["a"],"targetItems":[]}"#).unwrap();
        assert!(legacy.aliases.is_empty());
    }
}
