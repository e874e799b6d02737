//! Observer registrations.
//!
//! A [`ListenerSet`] holds two ordered bags:
//!
//! - **external** listeners: opaque `Arc<dyn _>` handles owned by the
//!   embedding application.
//! - **internal** listeners: other entities of the same database, held by
//!   id and resolved through the identity registry at every dispatch, so a
//!   copy-on-write replace of the listener never leaves a stale binding.
//!
//! Only the cascade set and vocab element sets take internal listeners,
//! and only the registries fill them. Column-list, vocab-list, column and
//! cell sets are external-only: their internal bag stays empty and their
//! notifiers never read it.
//!
//! Callbacks receive the database by shared reference and change records by
//! reference. They must not retain either past the call.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::index::IdentityRegistry;
use crate::model::{
    CellChanges, ColumnChanges, EntityId, Entity, InternalRole, VocabChanges,
};
use crate::storage::Database;
use crate::{Error, Result};

// ============================================================================
// Observer capabilities
// ============================================================================

/// Cascade boundary observer.
pub trait CascadeListener: Send + Sync {
    fn on_cascade_begin(&self, db: &Database);
    fn on_cascade_end(&self, db: &Database);
}

/// Structural changes of the column list.
pub trait ColumnListListener: Send + Sync {
    fn on_column_inserted(&self, db: &Database, col_id: EntityId);
    fn on_column_deleted(&self, db: &Database, col_id: EntityId);
}

/// Structural changes of the vocabulary list.
pub trait VocabListListener: Send + Sync {
    fn on_vocab_inserted(&self, db: &Database, ve_id: EntityId);
    fn on_vocab_deleted(&self, db: &Database, ve_id: EntityId);
}

/// Changes to one column. Deletion is announced while the column is still
/// registered.
pub trait ColumnListener: Send + Sync {
    fn on_column_changed(&self, db: &Database, col_id: EntityId, changes: &ColumnChanges);
    fn on_column_deleted(&self, db: &Database, col_id: EntityId);

    fn on_cell_inserted(&self, _db: &Database, _col_id: EntityId, _cell_id: EntityId) {}
    fn on_cell_deleted(&self, _db: &Database, _col_id: EntityId, _cell_id: EntityId) {}
}

/// Changes to one vocabulary element.
pub trait VocabElementListener: Send + Sync {
    fn on_vocab_changed(&self, db: &Database, ve_id: EntityId, changes: &VocabChanges);
    fn on_vocab_deleted(&self, db: &Database, ve_id: EntityId);
}

/// Changes to one cell, delivered once per cascade.
pub trait CellListener: Send + Sync {
    fn on_cell_changed(&self, db: &Database, cell_id: EntityId, changes: &CellChanges);
    fn on_cell_deleted(&self, db: &Database, cell_id: EntityId);
}

// ============================================================================
// ListenerSet
// ============================================================================

/// Snapshot taken before a dispatch loop, so callbacks may (de)register.
pub type Snapshot<T> = SmallVec<[T; 4]>;

pub struct ListenerSet<L: ?Sized> {
    role: InternalRole,
    external: Vec<Arc<L>>,
    internal: Vec<EntityId>,
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new(role: InternalRole) -> Self {
        Self { role, external: Vec::new(), internal: Vec::new() }
    }

    pub fn role(&self) -> InternalRole {
        self.role
    }

    pub fn add_external(&mut self, listener: Arc<L>) -> Result<()> {
        if self.position_external(&listener).is_some() {
            return Err(Error::InvalidListener(format!(
                "external {} listener already registered",
                self.role
            )));
        }
        self.external.push(listener);
        Ok(())
    }

    pub fn remove_external(&mut self, listener: &Arc<L>) -> Result<()> {
        let Some(pos) = self.position_external(listener) else {
            return Err(Error::InvalidListener(format!(
                "external {} listener is not registered",
                self.role
            )));
        };
        self.external.remove(pos);
        Ok(())
    }

    /// Register an internal listener by id. The caller resolves the id
    /// first with [`check_internal`].
    pub fn add_internal(&mut self, id: EntityId) -> Result<()> {
        if !id.is_valid() {
            return Err(Error::InvalidListener("internal listener id is invalid".into()));
        }
        if self.internal.contains(&id) {
            return Err(Error::InvalidListener(format!(
                "{id} is already an internal {} listener",
                self.role
            )));
        }
        self.internal.push(id);
        Ok(())
    }

    pub fn remove_internal(&mut self, id: EntityId) -> Result<()> {
        if !id.is_valid() {
            return Err(Error::InvalidListener("internal listener id is invalid".into()));
        }
        let Some(pos) = self.internal.iter().position(|i| *i == id) else {
            return Err(Error::InvalidListener(format!(
                "{id} is not an internal {} listener",
                self.role
            )));
        };
        self.internal.remove(pos);
        Ok(())
    }

    pub fn contains_internal(&self, id: EntityId) -> bool {
        self.internal.contains(&id)
    }

    pub fn external_snapshot(&self) -> Snapshot<Arc<L>> {
        self.external.iter().cloned().collect()
    }

    pub fn internal_snapshot(&self) -> Snapshot<EntityId> {
        self.internal.iter().copied().collect()
    }

    pub fn external_len(&self) -> usize {
        self.external.len()
    }

    pub fn internal_len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external.is_empty() && self.internal.is_empty()
    }

    fn position_external(&self, listener: &Arc<L>) -> Option<usize> {
        let target = Arc::as_ptr(listener) as *const ();
        self.external.iter().position(|l| Arc::as_ptr(l) as *const () == target)
    }
}

impl<L: ?Sized> Clone for ListenerSet<L> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            external: self.external.clone(),
            internal: self.internal.clone(),
        }
    }
}

impl<L: ?Sized> fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("role", &self.role)
            .field("external", &self.external.len())
            .field("internal", &self.internal)
            .finish()
    }
}

/// Resolve `id` and check it can act as an internal listener in `role`.
pub fn check_internal(registry: &IdentityRegistry, id: EntityId, role: InternalRole) -> Result<()> {
    if !id.is_valid() {
        return Err(Error::InvalidListener("internal listener id is invalid".into()));
    }
    let element = registry.get(id)?;
    if !element.supports(role) {
        return Err(Error::NotAnInternalListener { id, role });
    }
    Ok(())
}
