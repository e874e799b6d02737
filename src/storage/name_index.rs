//! Name ↔ id table of a named collection.

use hashbrown::HashMap;

use crate::model::EntityId;
use crate::{Error, Result};

/// Both directions are always updated together; a failed call changes
/// nothing.
#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    by_id: HashMap<EntityId, String>,
    by_name: HashMap<String, EntityId>,
    /// Insertion order, for stable iteration.
    order: Vec<EntityId>,
}

impl NameIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: EntityId, name: &str) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(Error::InvariantViolation(format!("id {id} is already in the name table")));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::NameConflict(format!("{name:?} is already in use")));
        }
        self.by_id.insert(id, name.to_string());
        self.by_name.insert(name.to_string(), id);
        self.order.push(id);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Result<String> {
        let name = self
            .by_id
            .remove(&id)
            .ok_or_else(|| Error::InvariantViolation(format!("id {id} is not in the name table")))?;
        self.by_name.remove(&name);
        self.order.retain(|i| *i != id);
        Ok(name)
    }

    pub(crate) fn rename(&mut self, id: EntityId, new_name: &str) -> Result<()> {
        let Some(old_name) = self.by_id.get(&id) else {
            return Err(Error::InvariantViolation(format!("id {id} is not in the name table")));
        };
        if old_name == new_name {
            return Ok(());
        }
        if self.by_name.contains_key(new_name) {
            return Err(Error::NameConflict(format!("{new_name:?} is already in use")));
        }
        let old_name = old_name.clone();
        self.by_name.remove(&old_name);
        self.by_name.insert(new_name.to_string(), id);
        self.by_id.insert(id, new_name.to_string());
        Ok(())
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn name_of(&self, id: EntityId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub(crate) fn contains_id(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn ids(&self) -> &[EntityId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rename_remove() {
        let mut names = NameIndex::new();
        names.insert(EntityId(1), "float").unwrap();
        names.insert(EntityId(2), "int").unwrap();
        assert!(matches!(names.insert(EntityId(3), "float"), Err(Error::NameConflict(_))));
        assert_eq!(names.len(), 2);

        names.rename(EntityId(1), "real").unwrap();
        assert_eq!(names.id_of("real"), Some(EntityId(1)));
        assert_eq!(names.id_of("float"), None);
        assert!(matches!(names.rename(EntityId(1), "int"), Err(Error::NameConflict(_))));
        assert_eq!(names.name_of(EntityId(1)), Some("real"));

        assert_eq!(names.remove(EntityId(1)).unwrap(), "real");
        assert!(!names.contains_name("real"));
        assert_eq!(names.ids(), &[EntityId(2)]);
    }
}
