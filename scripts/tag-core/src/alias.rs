use crate::error::{Result, TagError};
use crate::service::TagService;
use crate::store::TagStore;
use log::debug;

fn alias_key(alias: &str) -> String {
    alias.to_lowercase()
}

impl<S: TagStore> TagService<S> {
    /// Registers `alias` as a shortcut for `target_id`, case-insensitively.
    /// Re-registering an alias moves it to the new target.
    pub fn create_alias(&mut self, alias: &str, target_id: &str) -> Result<()> {
        if alias.trim().is_empty() {
            return Err(TagError::EmptyAlias);
        }
        self.require_tag(target_id)?;
        self.store.put_alias(&alias_key(alias), target_id)?;
        debug!("alias {:?} -> {}", alias, target_id);
        Ok(())
    }

    /// Tag id registered for `alias`, in a single lookup.
    pub fn get_tag_by_alias(&self, alias: &str) -> Result<Option<String>> {
        self.store.alias(&alias_key(alias))
    }

    pub fn aliases_for(&self, tag_id: &str) -> Result<Vec<String>> {
        self.store.aliases_for(tag_id)
    }
}
