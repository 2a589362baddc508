use crate::error::{Result, TagError};
use crate::model::{MergeSnapshot, Tag, TagMergeRecord};
use crate::service::TagService;
use crate::store::TagStore;
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<S: TagStore> TagService<S> {
    /// Folds every source tag into `target_id`.
    ///
    /// Sources are handled in order; a source equal to the target is skipped
    /// and a repeated source is handled once. Items holding a source end up
    /// holding the target instead, aliases and child tags follow, one history
    /// record is appended per source and the source tag is removed. All ids
    /// are checked first: an unknown one fails the call before anything is
    /// written.
    pub fn merge_tags<I: AsRef<str>>(
        &mut self,
        target_id: &str,
        source_ids: &[I],
    ) -> Result<Vec<TagMergeRecord>> {
        self.require_tag(target_id)?;

        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for source_id in source_ids {
            let source_id = source_id.as_ref();
            if source_id == target_id || !seen.insert(source_id) {
                continue;
            }
            sources.push(self.require_tag(source_id)?);
        }
        if sources.is_empty() {
            debug!("nothing to merge into {}", target_id);
            return Ok(Vec::new());
        }

        let records = self.store.transaction(|store| {
            let mut records = Vec::with_capacity(sources.len());
            for source in &sources {
                records.push(absorb(store, target_id, source)?);
            }
            Ok(records)
        })?;
        info!("Merged {} tags into {}", records.len(), target_id);
        Ok(records)
    }

    /// Puts a merged-away source tag back from its history snapshot.
    ///
    /// Items that held the target before the merge keep it; the others lose
    /// it again. The history record itself is left untouched and the undo is
    /// logged next to it.
    pub fn undo_merge(&mut self, merge_id: &str) -> Result<()> {
        let history = self.store.merges()?;
        let position = history
            .iter()
            .position(|record| record.id == merge_id)
            .ok_or_else(|| TagError::MergeNotFound(merge_id.to_string()))?;
        let record = history[position].clone();
        if self.store.is_undone(merge_id)? {
            return Err(TagError::MergeAlreadyUndone(merge_id.to_string()));
        }
        let snapshot = record
            .snapshot
            .clone()
            .ok_or_else(|| TagError::MissingSnapshot(merge_id.to_string()))?;
        self.require_tag(&record.target_tag_id)?;
        if self.store.tag(&record.source_tag_id)?.is_some() {
            return Err(TagError::TagAlreadyExists(record.source_tag_id.clone()));
        }

        let keep_target = target_kept_on(&self.store, &history, position)?;

        self.store
            .transaction(|store| restore(store, &record, &snapshot, &keep_target))?;
        info!(
            "Undid merge {}: restored {} ({} items)",
            merge_id,
            record.source_tag_id,
            snapshot.source_items.len()
        );
        Ok(())
    }

    /// Merges newer than `since_ms` that can still be undone, newest first.
    pub fn undoable_merges(&self, since_ms: i64) -> Result<Vec<TagMergeRecord>> {
        let mut records = Vec::new();
        for record in self.store.merges()?.into_iter().rev() {
            if record.snapshot.is_none() || record.merged_at <= since_ms {
                continue;
            }
            if self.store.is_undone(&record.id)? {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// The whole merge history, oldest first.
    pub fn merge_history(&self) -> Result<Vec<TagMergeRecord>> {
        self.store.merges()
    }
}

fn ancestors<S: TagStore>(store: &S, id: &str) -> Result<BTreeSet<String>> {
    let mut found = BTreeSet::new();
    let mut current = store.tag(id)?.and_then(|tag| tag.parent_id);
    while let Some(parent) = current {
        if !found.insert(parent.clone()) {
            break;
        }
        current = store.tag(&parent)?.and_then(|tag| tag.parent_id);
    }
    Ok(found)
}

fn absorb<S: TagStore>(store: &mut S, target_id: &str, source: &Tag) -> Result<TagMergeRecord> {
    let snapshot = MergeSnapshot {
        source_items: store.items_with_tag(&source.id)?,
        target_items: store.items_with_tag(target_id)?,
        aliases: store.aliases_for(&source.id)?,
        children: store.children_of(&source.id)?,
    };

    // Add before remove so an item holding both keeps exactly the target.
    for item in &snapshot.source_items {
        store.add_tag_to_item(item, target_id)?;
        store.remove_tag_from_item(item, &source.id)?;
    }
    for alias in &snapshot.aliases {
        store.put_alias(alias, target_id)?;
    }
    let target_ancestors = ancestors(store, target_id)?;
    for child in &snapshot.children {
        if child == target_id || target_ancestors.contains(child) {
            store.set_parent(child, source.parent_id.as_deref())?;
        } else {
            store.set_parent(child, Some(target_id))?;
        }
    }

    let merged_at = now_millis();
    let record = TagMergeRecord {
        id: format!("merge-{}-{}", merged_at, store.merges()?.len()),
        target_tag_id: target_id.to_string(),
        source_tag_id: source.id.clone(),
        source_tag_name: source.name.clone(),
        source_kind: source.kind,
        source_parent_id: source.parent_id.clone(),
        source_confidence: source.confidence,
        source_created_at: source.created_at,
        merged_at,
        snapshot: Some(snapshot),
    };
    store.append_merge(&record)?;
    store.delete_tag(&source.id)?;
    debug!(
        "merged {} ({:?}) into {}: {} items",
        source.id,
        source.name,
        target_id,
        record.snapshot.as_ref().map_or(0, |s| s.source_items.len())
    );
    Ok(record)
}

/// Items of `history[position]` that must keep the target after it is
/// undone: those another merge into the same target, still in place, brought
/// it to, and those that held it on their own before the merge.
fn target_kept_on<S: TagStore>(
    store: &S,
    history: &[TagMergeRecord],
    position: usize,
) -> Result<HashSet<String>> {
    let record = &history[position];
    let same_target = |other: &TagMergeRecord| other.target_tag_id == record.target_tag_id;

    let mut keep = HashSet::new();
    for (index, other) in history.iter().enumerate() {
        if index == position || !same_target(other) || store.is_undone(&other.id)? {
            continue;
        }
        if let Some(snapshot) = &other.snapshot {
            keep.extend(snapshot.source_items.iter().cloned());
        }
    }

    let Some(snapshot) = &record.snapshot else {
        return Ok(keep);
    };
    for item in &snapshot.target_items {
        let brought_by_earlier = history[..position]
            .iter()
            .filter(|earlier| same_target(*earlier))
            .filter_map(|earlier| earlier.snapshot.as_ref())
            .any(|earlier| earlier.source_items.contains(item) && !earlier.target_items.contains(item));
        if !brought_by_earlier {
            keep.insert(item.clone());
        }
    }
    Ok(keep)
}

fn restore<S: TagStore>(
    store: &mut S,
    record: &TagMergeRecord,
    snapshot: &MergeSnapshot,
    keep_target: &HashSet<String>,
) -> Result<()> {
    let source_id = record.source_tag_id.as_str();
    let target_id = record.target_tag_id.as_str();

    let mut source = Tag::new(source_id, record.source_tag_name.clone(), record.source_kind);
    source.confidence = record.source_confidence;
    source.created_at = record.source_created_at;
    if let Some(parent) = &record.source_parent_id {
        if store.tag(parent)?.is_some() {
            source.parent_id = Some(parent.clone());
        }
    }
    store.insert_tag(&source)?;

    for item in &snapshot.source_items {
        store.add_tag_to_item(item, source_id)?;
        if !keep_target.contains(item) {
            store.remove_tag_from_item(item, target_id)?;
        }
    }
    for alias in &snapshot.aliases {
        if store.alias(alias)?.as_deref() == Some(target_id) {
            store.put_alias(alias, source_id)?;
        }
    }
    for child in &snapshot.children {
        if store.tag(child)?.is_some() {
            store.set_parent(child, Some(source_id))?;
        }
    }
    store.record_undo(&record.id, now_millis())
}
