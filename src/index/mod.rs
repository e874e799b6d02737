//! Identity registry: the single owner of the id → entity mapping.
//!
//! The registry does not cascade or notify. Callers in `storage` wrap every
//! mutation in the cascade protocol.

use hashbrown::HashMap;

use crate::model::{
    Column, DataCell, DatabaseId, Element, ElementKind, Entity, EntityId, FormalArg, VocabElement,
};
use crate::{Error, Result};

#[derive(Debug)]
pub struct IdentityRegistry {
    db: DatabaseId,
    elements: HashMap<EntityId, Element>,
    next_id: u64,
}

impl IdentityRegistry {
    pub fn new(db: DatabaseId) -> Self {
        Self { db, elements: HashMap::new(), next_id: 1 }
    }

    /// Register a fresh entity and assign the next id.
    pub fn add(&mut self, element: impl Into<Element>) -> Result<EntityId> {
        let mut element = element.into();
        if element.db() != self.db {
            return Err(Error::InvalidArgument(format!(
                "{} belongs to {}, not {}",
                element.kind(),
                element.db(),
                self.db
            )));
        }
        if element.id().is_valid() {
            return Err(Error::DuplicateRegistration(format!(
                "{} already carries id {}",
                element.kind(),
                element.id()
            )));
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        element.assign_id(id);
        self.elements.insert(id, element);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Result<&Element> {
        self.elements.get(&id).ok_or_else(|| unknown(id))
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Result<&mut Element> {
        self.elements.get_mut(&id).ok_or_else(|| unknown(id))
    }

    /// Swap the entity bound to its id and return the retired instance.
    pub fn replace(&mut self, element: impl Into<Element>) -> Result<Element> {
        let element = element.into();
        let id = element.id();
        if element.db() != self.db {
            return Err(Error::InvalidArgument(format!("{} belongs to {}", element.kind(), element.db())));
        }
        let slot = self.elements.get_mut(&id).ok_or_else(|| unknown(id))?;
        if slot.kind() != element.kind() {
            return Err(Error::TypeMismatch {
                expected: slot.kind().to_string(),
                got: element.kind().to_string(),
            });
        }
        Ok(std::mem::replace(slot, element))
    }

    pub fn remove(&mut self, id: EntityId) -> Result<Element> {
        self.elements.remove(&id).ok_or_else(|| unknown(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    pub fn column(&self, id: EntityId) -> Result<&Column> {
        let element = self.get(id)?;
        element.as_column().ok_or_else(|| mismatch(ElementKind::Column, element.kind()))
    }

    pub fn vocab(&self, id: EntityId) -> Result<&VocabElement> {
        let element = self.get(id)?;
        element.as_vocab().ok_or_else(|| mismatch(ElementKind::VocabElement, element.kind()))
    }

    pub fn farg(&self, id: EntityId) -> Result<&FormalArg> {
        let element = self.get(id)?;
        element.as_farg().ok_or_else(|| mismatch(ElementKind::FormalArg, element.kind()))
    }

    pub fn cell(&self, id: EntityId) -> Result<&DataCell> {
        let element = self.get(id)?;
        element.as_cell().ok_or_else(|| mismatch(ElementKind::Cell, element.kind()))
    }

    pub(crate) fn column_mut(&mut self, id: EntityId) -> Result<&mut Column> {
        let element = self.get_mut(id)?;
        let kind = element.kind();
        element.as_column_mut().ok_or_else(|| mismatch(ElementKind::Column, kind))
    }

    pub(crate) fn vocab_mut(&mut self, id: EntityId) -> Result<&mut VocabElement> {
        let element = self.get_mut(id)?;
        let kind = element.kind();
        element.as_vocab_mut().ok_or_else(|| mismatch(ElementKind::VocabElement, kind))
    }

    pub(crate) fn cell_mut(&mut self, id: EntityId) -> Result<&mut DataCell> {
        let element = self.get_mut(id)?;
        let kind = element.kind();
        element.as_cell_mut().ok_or_else(|| mismatch(ElementKind::Cell, kind))
    }
}

fn unknown(id: EntityId) -> Error {
    Error::UnknownIdentifier(format!("no entity with id {id}"))
}

fn mismatch(expected: ElementKind, got: ElementKind) -> Error {
    Error::TypeMismatch { expected: expected.to_string(), got: got.to_string() }
}
