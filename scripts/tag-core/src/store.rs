use crate::error::{Result, TagError};
use crate::model::{Tag, TagKind, TagMergeRecord};
use crate::normalize::normalize;
use std::collections::{BTreeMap, BTreeSet};

/// Persistence seam for tags, item-tag links, aliases and the merge history.
///
/// Implementations behave like plain maps for the duration of one call; the
/// caller serializes merges. Alias keys arrive already case-folded.
pub trait TagStore {
    fn tag(&self, id: &str) -> Result<Option<Tag>>;

    /// All tags, oldest first (ties broken by id).
    fn tags(&self) -> Result<Vec<Tag>>;

    /// Fails with [`TagError::TagAlreadyExists`] when the id is taken.
    fn insert_tag(&mut self, tag: &Tag) -> Result<()>;

    /// Changes the display name and refreshes the normalized name.
    fn rename_tag(&mut self, id: &str, name: &str) -> Result<()>;

    fn set_parent(&mut self, id: &str, parent_id: Option<&str>) -> Result<()>;

    /// Removes the tag together with its links and aliases; children lose
    /// their parent.
    fn delete_tag(&mut self, id: &str) -> Result<()>;

    /// Item ids holding the tag, sorted.
    fn items_with_tag(&self, tag_id: &str) -> Result<Vec<String>>;

    fn tags_for_item(&self, item_id: &str) -> Result<BTreeSet<String>>;

    /// Idempotent; fails with [`TagError::TagNotFound`] for an unknown tag.
    fn add_tag_to_item(&mut self, item_id: &str, tag_id: &str) -> Result<()>;

    fn remove_tag_from_item(&mut self, item_id: &str, tag_id: &str) -> Result<()>;

    fn clear_item(&mut self, item_id: &str) -> Result<()>;

    fn append_merge(&mut self, record: &TagMergeRecord) -> Result<()>;

    /// The merge history in append order.
    fn merges(&self) -> Result<Vec<TagMergeRecord>>;

    fn record_undo(&mut self, merge_id: &str, undone_at: i64) -> Result<()>;

    fn is_undone(&self, merge_id: &str) -> Result<bool>;

    /// Inserts or re-points an alias.
    fn put_alias(&mut self, key: &str, tag_id: &str) -> Result<()>;

    fn alias(&self, key: &str) -> Result<Option<String>>;

    /// Alias keys pointing at the tag, sorted.
    fn aliases_for(&self, tag_id: &str) -> Result<Vec<String>>;

    fn find_tag(&self, normalized_name: &str, kind: TagKind) -> Result<Option<Tag>> {
        Ok(self
            .tags()?
            .into_iter()
            .find(|tag| tag.kind == kind && tag.normalized_name == normalized_name))
    }

    fn children_of(&self, id: &str) -> Result<Vec<String>> {
        Ok(self
            .tags()?
            .into_iter()
            .filter(|tag| tag.parent_id.as_deref() == Some(id))
            .map(|tag| tag.id)
            .collect())
    }

    /// Runs `f` so that either all of its writes land or none do.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        f(self)
    }
}

/// Map-backed store, used by tests and by callers that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryTagStore {
    tags: BTreeMap<String, Tag>,
    item_tags: BTreeMap<String, BTreeSet<String>>,
    merges: Vec<TagMergeRecord>,
    undone: BTreeMap<String, i64>,
    aliases: BTreeMap<String, String>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    fn tag_mut(&mut self, id: &str) -> Result<&mut Tag> {
        self.tags
            .get_mut(id)
            .ok_or_else(|| TagError::TagNotFound(id.to_string()))
    }
}

impl TagStore for MemoryTagStore {
    fn tag(&self, id: &str) -> Result<Option<Tag>> {
        Ok(self.tags.get(id).cloned())
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tags)
    }

    fn insert_tag(&mut self, tag: &Tag) -> Result<()> {
        if self.tags.contains_key(&tag.id) {
            return Err(TagError::TagAlreadyExists(tag.id.clone()));
        }
        self.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    fn rename_tag(&mut self, id: &str, name: &str) -> Result<()> {
        let tag = self.tag_mut(id)?;
        tag.name = name.to_string();
        tag.normalized_name = normalize(name);
        Ok(())
    }

    fn set_parent(&mut self, id: &str, parent_id: Option<&str>) -> Result<()> {
        self.tag_mut(id)?.parent_id = parent_id.map(str::to_string);
        Ok(())
    }

    fn delete_tag(&mut self, id: &str) -> Result<()> {
        self.tags.remove(id);
        self.item_tags.retain(|_, tags| {
            tags.remove(id);
            !tags.is_empty()
        });
        self.aliases.retain(|_, target| target.as_str() != id);
        for tag in self.tags.values_mut() {
            if tag.parent_id.as_deref() == Some(id) {
                tag.parent_id = None;
            }
        }
        Ok(())
    }

    fn items_with_tag(&self, tag_id: &str) -> Result<Vec<String>> {
        Ok(self
            .item_tags
            .iter()
            .filter(|(_, tags)| tags.contains(tag_id))
            .map(|(item, _)| item.clone())
            .collect())
    }

    fn tags_for_item(&self, item_id: &str) -> Result<BTreeSet<String>> {
        Ok(self.item_tags.get(item_id).cloned().unwrap_or_default())
    }

    fn add_tag_to_item(&mut self, item_id: &str, tag_id: &str) -> Result<()> {
        if !self.tags.contains_key(tag_id) {
            return Err(TagError::TagNotFound(tag_id.to_string()));
        }
        self.item_tags
            .entry(item_id.to_string())
            .or_default()
            .insert(tag_id.to_string());
        Ok(())
    }

    fn remove_tag_from_item(&mut self, item_id: &str, tag_id: &str) -> Result<()> {
        if let Some(tags) = self.item_tags.get_mut(item_id) {
            tags.remove(tag_id);
            if tags.is_empty() {
                self.item_tags.remove(item_id);
            }
        }
        Ok(())
    }

    fn clear_item(&mut self, item_id: &str) -> Result<()> {
        self.item_tags.remove(item_id);
        Ok(())
    }

    fn append_merge(&mut self, record: &TagMergeRecord) -> Result<()> {
        self.merges.push(record.clone());
        Ok(())
    }

    fn merges(&self) -> Result<Vec<TagMergeRecord>> {
        Ok(self.merges.clone())
    }

    fn record_undo(&mut self, merge_id: &str, undone_at: i64) -> Result<()> {
        self.undone.insert(merge_id.to_string(), undone_at);
        Ok(())
    }

    fn is_undone(&self, merge_id: &str) -> Result<bool> {
        Ok(self.undone.contains_key(merge_id))
    }

    fn put_alias(&mut self, key: &str, tag_id: &str) -> Result<()> {
        self.aliases.insert(key.to_string(), tag_id.to_string());
        Ok(())
    }

    fn alias(&self, key: &str) -> Result<Option<String>> {
        Ok(self.aliases.get(key).cloned())
    }

    fn aliases_for(&self, tag_id: &str) -> Result<Vec<String>> {
        Ok(self
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == tag_id)
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let checkpoint = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = checkpoint;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(tags: &[(&str, &str)]) -> MemoryTagStore {
        let mut store = MemoryTagStore::new();
        for (id, name) in tags {
            store.insert_tag(&Tag::new(*id, *name, TagKind::Manual)).unwrap();
        }
        store
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut store = store_with(&[("t1", "portrait")]);
        let err = store.insert_tag(&Tag::new("t1", "other", TagKind::Ai)).unwrap_err();
        assert!(matches!(err, TagError::TagAlreadyExists(id) if id == "t1"));
    }

    #[test]
    fn links_are_sets() {
        let mut store = store_with(&[("t1", "portrait")]);
        store.add_tag_to_item("item1", "t1").unwrap();
        store.add_tag_to_item("item1", "t1").unwrap();
        assert_eq!(store.tags_for_item("item1").unwrap().len(), 1);
        assert_eq!(store.items_with_tag("t1").unwrap(), vec!["item1"]);
        assert!(matches!(
            store.add_tag_to_item("item1", "missing"),
            Err(TagError::TagNotFound(_))
        ));
    }

    #[test]
    fn delete_cascades() {
        let mut store = store_with(&[("t1", "portrait"), ("t2", "face")]);
        store.set_parent("t2", Some("t1")).unwrap();
        store.add_tag_to_item("item1", "t1").unwrap();
        store.put_alias("pp", "t1").unwrap();
        store.delete_tag("t1").unwrap();
        assert!(store.tag("t1").unwrap().is_none());
        assert!(store.tags_for_item("item1").unwrap().is_empty());
        assert!(store.alias("pp").unwrap().is_none());
        assert!(store.tag("t2").unwrap().unwrap().parent_id.is_none());
    }

    #[test]
    fn rename_refreshes_normalized_name() {
        let mut store = store_with(&[("t1", "portrait")]);
        store.rename_tag("t1", "Faces").unwrap();
        let tag = store.tag("t1").unwrap().unwrap();
        assert_eq!(tag.name, "Faces");
        assert_eq!(tag.normalized_name, "face");
        assert_eq!(store.find_tag("face", TagKind::Manual).unwrap().unwrap().id, "t1");
        assert!(store.find_tag("face", TagKind::Ai).unwrap().is_none());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let mut store = store_with(&[("t1", "portrait")]);
        let result: Result<()> = store.transaction(|store| {
            store.add_tag_to_item("item1", "t1")?;
            store.add_tag_to_item("item1", "missing")
        });
        assert!(result.is_err());
        assert!(store.tags_for_item("item1").unwrap().is_empty());
    }
}
