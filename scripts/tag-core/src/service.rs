use crate::error::{Result, TagError};
use crate::model::{Resolution, Tag, TagKind};
use crate::normalize::normalize;
use crate::similarity::{are_tags_similar_with, SimilarityPolicy};
use crate::store::TagStore;
use log::debug;

/// Tag operations over an injected store.
///
/// Merge, undo, alias and hierarchy operations live in their own modules as
/// further `impl` blocks on this type.
pub struct TagService<S: TagStore> {
    pub(crate) store: S,
    pub(crate) policy: SimilarityPolicy,
}

impl<S: TagStore> TagService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, SimilarityPolicy::default())
    }

    pub fn with_policy(store: S, policy: SimilarityPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn policy(&self) -> &SimilarityPolicy {
        &self.policy
    }

    pub(crate) fn require_tag(&self, id: &str) -> Result<Tag> {
        self.store
            .tag(id)?
            .ok_or_else(|| TagError::TagNotFound(id.to_string()))
    }

    /// Id of the tag sharing `name`'s normalized form and `kind`, created
    /// on first use.
    pub fn get_or_create_tag(
        &mut self,
        name: &str,
        kind: TagKind,
        confidence: Option<f64>,
    ) -> Result<String> {
        get_or_create_in(&mut self.store, name, kind, confidence)
    }

    /// Replaces every tag of `item_id` with `names`, creating tags as needed.
    pub fn tag_items(&mut self, item_id: &str, names: &[&str], kind: TagKind) -> Result<Vec<String>> {
        self.store.transaction(|store| {
            store.clear_item(item_id)?;
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                if name.trim().is_empty() {
                    continue;
                }
                let id = get_or_create_in(store, name, kind, None)?;
                store.add_tag_to_item(item_id, &id)?;
                ids.push(id);
            }
            Ok(ids)
        })
    }

    /// Existing tags `name` looks similar to, in store order.
    pub fn find_similar(&self, name: &str) -> Result<Vec<Tag>> {
        Ok(self
            .store
            .tags()?
            .into_iter()
            .filter(|tag| are_tags_similar_with(&self.policy, name, &tag.name))
            .collect())
    }

    /// Looks a name up by alias, then by normalized name, then by similarity.
    pub fn resolve(&self, name: &str) -> Result<Option<Resolution>> {
        if let Some(id) = self.get_tag_by_alias(name)? {
            return Ok(Some(Resolution::Alias(id)));
        }
        let normalized = normalize(name);
        let tags = self.store.tags()?;
        if let Some(tag) = tags.iter().find(|tag| tag.normalized_name == normalized) {
            return Ok(Some(Resolution::Exact(tag.id.clone())));
        }
        Ok(tags
            .into_iter()
            .find(|tag| are_tags_similar_with(&self.policy, name, &tag.name))
            .map(|tag| Resolution::Similar(tag.id)))
    }
}

fn get_or_create_in<S: TagStore>(
    store: &mut S,
    name: &str,
    kind: TagKind,
    confidence: Option<f64>,
) -> Result<String> {
    let normalized = normalize(name);
    if let Some(existing) = store.find_tag(&normalized, kind)? {
        return Ok(existing.id);
    }
    let id = next_tag_id(store)?;
    let mut tag = Tag::new(id.clone(), name.trim(), kind);
    tag.confidence = confidence;
    store.insert_tag(&tag)?;
    debug!("tag created: {} ({}) -> {}", name, kind, id);
    Ok(id)
}

fn next_tag_id<S: TagStore>(store: &S) -> Result<String> {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut counter = store.tags()?.len();
    loop {
        let candidate = format!("tag-{millis}-{counter}");
        if store.tag(&candidate)?.is_none() {
            return Ok(candidate);
        }
        counter += 1;
    }
}
