//! Vocabulary registry.
//!
//! Besides keeping the name table in step with the identity registry, a
//! vocab element replace reconciles the argument list: new arguments are
//! registered, kept arguments are replaced in place, and dropped arguments
//! are unregistered. The resulting [`VocabChanges`] drives every governed
//! column through the value update protocol.

use hashbrown::HashSet;
use tracing::{debug, trace};

use super::Database;
use super::columns::ListEvent;
use super::name_index::NameIndex;
use crate::listeners::{ListenerSet, VocabListListener};
use crate::model::{Element, ElementKind, Entity, EntityId, InternalRole, VocabChanges, VocabElement, VocabKind};
use crate::{Error, Result};

pub(crate) struct VocabRegistry {
    pub(crate) names: NameIndex,
    pub(crate) listeners: ListenerSet<dyn VocabListListener>,
}

/// Event delivered to internal vocab element listeners.
#[derive(Debug, Clone, Copy)]
pub(crate) enum VocabEvent<'a> {
    Changed(&'a VocabChanges),
    Deleted,
}

// ============================================================================
// Views
// ============================================================================

/// Read access to the vocabulary list.
#[derive(Clone, Copy)]
pub struct VocabList<'a> {
    db: &'a Database,
}

impl<'a> VocabList<'a> {
    pub fn lookup_by_id(&self, id: EntityId) -> Result<&'a VocabElement> {
        if !self.db.vocab.names.contains_id(id) {
            return Err(Error::UnknownIdentifier(format!("no vocab element with id {id}")));
        }
        self.db.index.vocab(id)
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<&'a VocabElement> {
        let id = self
            .db
            .vocab
            .names
            .id_of(name)
            .ok_or_else(|| Error::UnknownIdentifier(format!("no vocab element named {name:?}")))?;
        self.db.index.vocab(id)
    }

    /// Name recorded in the name table for `id`.
    pub fn name_of(&self, id: EntityId) -> Option<&'a str> {
        self.db.vocab.names.name_of(id)
    }

    pub fn contains_id(&self, id: EntityId) -> bool {
        self.db.vocab.names.contains_id(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.db.vocab.names.contains_name(name)
    }

    pub fn len(&self) -> usize {
        self.db.vocab.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> &'a [EntityId] {
        self.db.vocab.names.ids()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a VocabElement> + use<'a> {
        let db = self.db;
        db.vocab.names.ids().iter().filter_map(move |id| db.index.vocab(*id).ok())
    }
}

/// Registry-level mutation of the vocabulary list.
pub struct VocabListMut<'a> {
    db: &'a mut Database,
}

impl VocabListMut<'_> {
    pub fn insert(&mut self, ve: VocabElement) -> Result<EntityId> {
        self.db.insert_vocab_entry(ve)
    }

    pub fn remove(&mut self, id: EntityId) -> Result<()> {
        self.db.remove_vocab_entry(id)
    }

    pub fn replace(&mut self, ve: VocabElement) -> Result<()> {
        self.db.replace_vocab_entry(ve)
    }

    pub fn list(&self) -> VocabList<'_> {
        VocabList { db: self.db }
    }
}

// ============================================================================
// Operations
// ============================================================================

impl Database {
    pub fn vocab(&self) -> VocabList<'_> {
        VocabList { db: self }
    }

    pub fn vocab_mut(&mut self) -> VocabListMut<'_> {
        VocabListMut { db: self }
    }

    pub fn vocab_element(&self, id: EntityId) -> Result<&VocabElement> {
        self.vocab().lookup_by_id(id)
    }

    /// Add a vocab element. Equivalent to `vocab_mut().insert(ve)`.
    pub fn add_vocab_element(&mut self, ve: VocabElement) -> Result<EntityId> {
        self.insert_vocab_entry(ve)
    }

    /// Remove a vocab element. Matrix elements that still govern a column
    /// go through [`Database::remove_column`] instead.
    pub fn remove_vocab_element(&mut self, id: EntityId) -> Result<()> {
        self.remove_vocab_entry(id)
    }

    /// Replace a vocab element. Governed columns are renamed and their
    /// cells updated inside the same cascade.
    pub fn replace_vocab_element(&mut self, ve: VocabElement) -> Result<()> {
        self.replace_vocab_entry(ve)
    }

    // ========================================================================
    // Registry protocol
    // ========================================================================

    pub(crate) fn insert_vocab_entry(&mut self, ve: VocabElement) -> Result<EntityId> {
        self.ensure_usable()?;
        if ve.db() != self.id {
            return Err(Error::InvalidArgument(format!("vocab element {} belongs to {}", ve.name(), ve.db())));
        }
        if ve.id().is_valid() {
            return Err(Error::InvalidArgument(format!(
                "vocab element {} is already registered as {}",
                ve.name(),
                ve.id()
            )));
        }
        if ve.col_id().is_valid() {
            return Err(Error::InvalidArgument(format!(
                "vocab element {} already claims column {}",
                ve.name(),
                ve.col_id()
            )));
        }
        ve.validate_shape()?;
        if let Some(farg) = ve.fargs().iter().find(|f| f.id().is_valid()) {
            return Err(Error::InvalidArgument(format!(
                "argument {} of {} is already registered as {}",
                farg.name(),
                ve.name(),
                farg.id()
            )));
        }
        self.check_vocab_name_free(ve.name())?;

        let name = ve.name().to_string();
        let mut ve = ve;
        ve.set_listeners(Some(ListenerSet::new(InternalRole::VocabElement)));
        self.in_cascade(move |db| {
            let id = db.index.add(ve)?;
            let fargs = {
                let ve = db.index.vocab_mut(id)?;
                ve.propagate_id();
                ve.fargs().to_vec()
            };
            for (i, farg) in fargs.into_iter().enumerate() {
                let farg_id = db.index.add(farg)?;
                db.index.vocab_mut(id)?.set_farg_id(i, farg_id);
            }
            db.vocab.names.insert(id, &name)?;
            debug!(db = %db.id, ve = %id, %name, "vocab element inserted");
            db.notify_vocab_list(id, ListEvent::Inserted);
            Ok(id)
        })
    }

    pub(crate) fn remove_vocab_entry(&mut self, id: EntityId) -> Result<()> {
        self.ensure_usable()?;
        let ve = self.vocab_element(id)?;
        if ve.col_id().is_valid() {
            return Err(Error::NotEmpty(format!(
                "vocab element {} still governs column {}",
                ve.name(),
                ve.col_id()
            )));
        }
        if let Some(farg) = ve.fargs().iter().find(|f| !self.index.contains(f.id())) {
            return Err(Error::InvariantViolation(format!(
                "argument {} of {} is not registered",
                farg.name(),
                ve.name()
            )));
        }

        self.in_cascade(|db| {
            db.notify_vocab_element(id, VocabEvent::Deleted)?;
            db.index.vocab_mut(id)?.set_listeners(None);
            db.notify_vocab_list(id, ListEvent::Deleted);
            let Element::Vocab(retired) = db.index.remove(id)? else {
                return Err(Error::InvariantViolation(format!("{id} stopped being a vocab element")));
            };
            for farg in retired.fargs() {
                db.index.remove(farg.id())?;
            }
            db.vocab.names.remove(id)?;
            debug!(db = %db.id, ve = %id, name = %retired.name(), "vocab element removed");
            Ok(())
        })
    }

    pub(crate) fn replace_vocab_entry(&mut self, ve: VocabElement) -> Result<()> {
        self.ensure_usable()?;
        let id = ve.id();
        let renamed = self.check_vocab_replace(&ve)?;
        let new_name = ve.name().to_string();

        let mut ve = ve;
        self.in_cascade(move |db| {
            let old_farg_ids: Vec<EntityId> = db.index.vocab(id)?.fargs().iter().map(|f| f.id()).collect();

            for i in 0..ve.num_fargs() {
                let Some(mut farg) = ve.farg(i).cloned() else { break };
                farg.set_ve_id(id);
                if farg.id().is_valid() {
                    db.index.replace(farg)?;
                } else {
                    let farg_id = db.index.add(farg)?;
                    ve.set_farg_id(i, farg_id);
                }
            }
            ve.propagate_id();
            for farg_id in old_farg_ids {
                if ve.farg_index(farg_id).is_none() {
                    db.index.remove(farg_id)?;
                }
            }

            let Element::Vocab(mut retired) = db.index.replace(ve)? else {
                return Err(Error::InvariantViolation(format!("{id} stopped being a vocab element")));
            };
            let current = db.index.vocab_mut(id)?;
            current.set_listeners(retired.take_listeners());
            let changes = VocabChanges::between(&retired, current)?;
            if renamed {
                db.vocab.names.rename(id, &new_name)?;
            }
            debug!(db = %db.id, ve = %id, "vocab element replaced");
            if let Some(changes) = changes {
                db.notify_vocab_element(id, VocabEvent::Changed(&changes))?;
            }
            Ok(())
        })
    }

    // ========================================================================
    // Preconditions
    // ========================================================================

    fn check_vocab_name_free(&self, name: &str) -> Result<()> {
        if self.vocab.names.contains_name(name) {
            return Err(Error::NameConflict(format!("{name:?} is already a vocab element")));
        }
        if self.columns.names.contains_name(name) {
            return Err(Error::NameConflict(format!("{name:?} is already a column")));
        }
        Ok(())
    }

    /// Returns whether the name changes.
    fn check_vocab_replace(&self, ve: &VocabElement) -> Result<bool> {
        let id = ve.id();
        if ve.db() != self.id {
            return Err(Error::InvalidArgument(format!("vocab element {} belongs to {}", ve.name(), ve.db())));
        }
        if !id.is_valid() {
            return Err(Error::InvalidArgument(format!("vocab element {} has no id", ve.name())));
        }
        let old = self.vocab_element(id)?;
        match (old.kind(), ve.kind()) {
            (VocabKind::Predicate, VocabKind::Predicate) => {}
            (
                VocabKind::Matrix { matrix_type: a, col_id: old_col },
                VocabKind::Matrix { matrix_type: b, col_id: new_col },
            ) if a == b => {
                if old_col != new_col {
                    return Err(Error::InvariantViolation(format!(
                        "vocab element {id} cannot change the column it governs"
                    )));
                }
            }
            _ => {
                return Err(Error::TypeMismatch {
                    expected: describe(old.kind()),
                    got: describe(ve.kind()),
                });
            }
        }
        ve.validate_shape()?;

        let mut seen = HashSet::new();
        for farg in ve.fargs().iter().filter(|f| f.id().is_valid()) {
            if !seen.insert(farg.id()) {
                return Err(Error::InvalidArgument(format!(
                    "argument id {} appears twice in {}",
                    farg.id(),
                    ve.name()
                )));
            }
            let Some(j) = old.farg_index(farg.id()) else {
                return Err(Error::InvalidArgument(format!(
                    "argument {} ({}) does not belong to {}",
                    farg.name(),
                    farg.id(),
                    old.name()
                )));
            };
            let before = &old.fargs()[j];
            if before.farg_type() != farg.farg_type() {
                return Err(Error::TypeMismatch {
                    expected: format!("{} argument {}", before.farg_type(), farg.id()),
                    got: format!("{} argument", farg.farg_type()),
                });
            }
        }

        let renamed = old.name() != ve.name();
        if renamed {
            if !ve.name_is_valid(ve.name()) {
                return Err(Error::InvalidArgument(format!("{:?} is not a valid name", ve.name())));
            }
            self.check_vocab_name_free(ve.name())?;
        }
        Ok(renamed)
    }

    // ========================================================================
    // Notification
    // ========================================================================

    fn notify_vocab_list(&self, ve_id: EntityId, event: ListEvent) {
        for listener in &self.vocab.listeners.external_snapshot() {
            match event {
                ListEvent::Inserted => listener.on_vocab_inserted(self, ve_id),
                ListEvent::Deleted => listener.on_vocab_deleted(self, ve_id),
            }
        }
    }

    /// Internal listeners first, so governed columns have caught up before
    /// external observers look.
    fn notify_vocab_element(&mut self, ve_id: EntityId, event: VocabEvent<'_>) -> Result<()> {
        let (internal, external) = {
            let listeners = self.index.vocab(ve_id)?.listeners().ok_or_else(|| {
                Error::InvariantViolation(format!("vocab element {ve_id} lost its listener set"))
            })?;
            (listeners.internal_snapshot(), listeners.external_snapshot())
        };
        for listener_id in internal {
            self.dispatch_vocab_event(listener_id, ve_id, event)?;
        }
        for listener in &external {
            match event {
                VocabEvent::Changed(changes) => listener.on_vocab_changed(self, ve_id, changes),
                VocabEvent::Deleted => listener.on_vocab_deleted(self, ve_id),
            }
        }
        Ok(())
    }

    fn dispatch_vocab_event(&mut self, listener_id: EntityId, ve_id: EntityId, event: VocabEvent<'_>) -> Result<()> {
        let element = self.index.get(listener_id)?;
        if !element.supports(InternalRole::VocabElement) {
            return Err(Error::NotAnInternalListener { id: listener_id, role: InternalRole::VocabElement });
        }
        trace!(db = %self.id, listener = %listener_id, ve = %ve_id, ?event, "vocab event -> internal listener");
        match (element.kind(), event) {
            (ElementKind::Column, VocabEvent::Changed(changes)) => {
                self.column_on_vocab_changed(listener_id, ve_id, changes)
            }
            (ElementKind::Column, VocabEvent::Deleted) => Err(Error::InvariantViolation(format!(
                "column {listener_id} outlived its matrix vocab element {ve_id}"
            ))),
            _ => Err(Error::NotAnInternalListener { id: listener_id, role: InternalRole::VocabElement }),
        }
    }
}

fn describe(kind: &VocabKind) -> String {
    match kind {
        VocabKind::Matrix { matrix_type, .. } => format!("{matrix_type} matrix vocab element"),
        VocabKind::Predicate => "predicate vocab element".into(),
    }
}
