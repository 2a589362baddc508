use crate::error::{Result, TagError};
use crate::model::{Tag, TagNode};
use crate::service::TagService;
use crate::store::TagStore;
use std::collections::{HashMap, HashSet};

impl<S: TagStore> TagService<S> {
    /// Places `child_id` under `parent_id`, or makes it a root with `None`.
    pub fn set_tag_parent(&mut self, child_id: &str, parent_id: Option<&str>) -> Result<()> {
        if parent_id == Some(child_id) {
            return Err(TagError::SelfParent(child_id.to_string()));
        }
        self.require_tag(child_id)?;
        if let Some(parent_id) = parent_id {
            self.require_tag(parent_id)?;
            // Walk up from the new parent; meeting the child means a loop.
            let mut current = Some(parent_id.to_string());
            while let Some(id) = current {
                if id == child_id {
                    return Err(TagError::HierarchyCycle {
                        child: child_id.to_string(),
                        parent: parent_id.to_string(),
                    });
                }
                current = self.store.tag(&id)?.and_then(|tag| tag.parent_id);
            }
        }
        self.store.set_parent(child_id, parent_id)
    }

    /// Every tag arranged under its parent. Tags whose parent is missing are
    /// treated as roots.
    pub fn tag_tree(&self) -> Result<Vec<TagNode>> {
        let tags = self.store.tags()?;
        let known: HashSet<&str> = tags.iter().map(|tag| tag.id.as_str()).collect();
        let mut by_parent: HashMap<Option<String>, Vec<Tag>> = HashMap::new();
        for tag in &tags {
            let parent = tag
                .parent_id
                .clone()
                .filter(|parent| known.contains(parent.as_str()));
            by_parent.entry(parent).or_default().push(tag.clone());
        }
        Ok(build_level(&mut by_parent, None))
    }
}

fn build_level(by_parent: &mut HashMap<Option<String>, Vec<Tag>>, parent: Option<String>) -> Vec<TagNode> {
    let Some(tags) = by_parent.remove(&parent) else {
        return Vec::new();
    };
    tags.into_iter()
        .map(|tag| {
            let children = build_level(by_parent, Some(tag.id.clone()));
            TagNode { tag, children }
        })
        .collect()
}
