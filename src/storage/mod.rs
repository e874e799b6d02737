//! # Database
//!
//! The per-database context: identity registry, cascade controller, and the
//! two named collection registries (columns and vocabulary).
//!
//! ## Mutation protocol
//!
//! Every structural edit follows the same shape:
//!
//! 1. Check preconditions. A failure here changes nothing.
//! 2. Open a cascade (nested cascades coalesce).
//! 3. Update the identity registry and the name table together.
//! 4. Push dependent entities through their update protocol, which may
//!    re-enter the registries.
//! 5. Notify listeners.
//! 6. Close the cascade.
//!
//! A failure between 2 and 6 is a defect. The database is then poisoned:
//! later mutations fail and only reads remain available.
//!
//! ## Limitations
//!
//! - **Single writer**: `Database` is a plain value mutated through
//!   `&mut self`. Share it across threads with [`SharedDatabase`].
//! - **No rollback**: there are no transactions. A poisoned database must be
//!   discarded.

mod cells;
mod columns;
mod name_index;
mod propagate;
mod shared;
mod vocab;

pub use columns::{ColumnList, ColumnListMut};
pub use shared::SharedDatabase;
pub use vocab::{VocabList, VocabListMut};

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cascade::{Boundary, CascadeController};
use crate::config::DatabaseConfig;
use crate::index::IdentityRegistry;
use crate::listeners::{
    CascadeListener, CellListener, ColumnListListener, ColumnListener, ListenerSet, VocabElementListener,
    VocabListListener, check_internal,
};
use crate::model::{DatabaseId, ElementKind, Entity, EntityId, InternalRole};
use crate::{Error, Result};

use columns::ColumnRegistry;
use name_index::NameIndex;
use vocab::VocabRegistry;

/// Cascade edge delivered to an internal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CascadeEdge {
    Begin,
    End,
}

pub struct Database {
    id: DatabaseId,
    config: DatabaseConfig,
    index: IdentityRegistry,
    cascade: CascadeController,
    columns: ColumnRegistry,
    vocab: VocabRegistry,
    poisoned: bool,
}

impl Database {
    pub fn new() -> Self {
        let id = DatabaseId::allocate();
        Self {
            id,
            config: DatabaseConfig::default(),
            index: IdentityRegistry::new(id),
            cascade: CascadeController::new(),
            columns: ColumnRegistry {
                names: NameIndex::new(),
                listeners: ListenerSet::new(InternalRole::ColumnList),
            },
            vocab: VocabRegistry {
                names: NameIndex::new(),
                listeners: ListenerSet::new(InternalRole::VocabList),
            },
            poisoned: false,
        }
    }

    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let mut db = Self::new();
        debug!(db = %db.id, name = %config.name, "database created");
        db.config = config;
        Ok(db)
    }

    pub fn id(&self) -> DatabaseId {
        self.id
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Read-only view of the identity registry.
    pub fn index(&self) -> &IdentityRegistry {
        &self.index
    }

    pub fn cascade_depth(&self) -> i64 {
        self.cascade.depth()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    // ========================================================================
    // Cascade boundaries
    // ========================================================================

    /// Open (or nest into) a cascade so several edits reach observers as one.
    pub fn begin_cascade(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let outcome = self.cascade_start();
        self.poison_on_err(outcome)
    }

    pub fn end_cascade(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if !self.cascade.is_open() {
            return Err(Error::PrematureEnd);
        }
        let outcome = self.cascade_end();
        self.poison_on_err(outcome)
    }

    /// Begin: external listeners, then internal ones.
    pub(crate) fn cascade_start(&mut self) -> Result<()> {
        if self.cascade.enter()? != Boundary::Opened {
            return Ok(());
        }
        debug!(db = %self.id, "cascade begin");
        let external = self.cascade.listeners().external_snapshot();
        for listener in &external {
            trace!(db = %self.id, "cascade begin -> external listener");
            listener.on_cascade_begin(self);
        }
        let internal = self.cascade.listeners().internal_snapshot();
        for id in internal {
            self.dispatch_cascade(id, CascadeEdge::Begin)?;
        }
        Ok(())
    }

    /// End: internal listeners, then external ones.
    pub(crate) fn cascade_end(&mut self) -> Result<()> {
        if self.cascade.exit()? != Boundary::Closed {
            return Ok(());
        }
        let internal = self.cascade.listeners().internal_snapshot();
        for id in internal {
            self.dispatch_cascade(id, CascadeEdge::End)?;
        }
        let external = self.cascade.listeners().external_snapshot();
        for listener in &external {
            trace!(db = %self.id, "cascade end -> external listener");
            listener.on_cascade_end(self);
        }
        debug!(db = %self.id, "cascade end");
        Ok(())
    }

    fn dispatch_cascade(&mut self, id: EntityId, edge: CascadeEdge) -> Result<()> {
        let element = self.index.get(id)?;
        if !element.supports(InternalRole::Cascade) {
            return Err(Error::NotAnInternalListener { id, role: InternalRole::Cascade });
        }
        trace!(db = %self.id, listener = %id, ?edge, "cascade edge -> internal listener");
        match element.kind() {
            ElementKind::Column => self.column_cascade_edge(id, edge),
            ElementKind::VocabElement | ElementKind::FormalArg | ElementKind::Cell => {
                Err(Error::NotAnInternalListener { id, role: InternalRole::Cascade })
            }
        }
    }

    /// Run `body` inside a cascade, poisoning the database if anything
    /// fails once the cascade is open.
    pub(crate) fn in_cascade<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outcome = match self.cascade_start() {
            Ok(()) => body(self).and_then(|value| self.cascade_end().map(|()| value)),
            Err(e) => Err(e),
        };
        self.poison_on_err(outcome)
    }

    fn poison_on_err<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome
            && !self.poisoned
        {
            warn!(db = %self.id, error = %e, "failure inside an open cascade, database poisoned");
            self.poisoned = true;
        }
        outcome
    }

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::InvariantViolation(format!(
                "{} is poisoned by an earlier failure inside a cascade",
                self.id
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Listener registration
    // ========================================================================

    pub fn add_cascade_listener(&mut self, listener: Arc<dyn CascadeListener>) -> Result<()> {
        self.cascade.listeners_mut().add_external(listener)
    }

    pub fn remove_cascade_listener(&mut self, listener: &Arc<dyn CascadeListener>) -> Result<()> {
        self.cascade.listeners_mut().remove_external(listener)
    }

    /// Register entity `id` for cascade edges. Registering while a cascade
    /// is open delivers the pending begin edge right away, so every end the
    /// listener sees has a matching begin.
    ///
    /// Internal bindings belong to the registries: a data column is wired up
    /// on insert and unwired on removal, never by callers.
    pub(crate) fn add_internal_cascade_listener(&mut self, id: EntityId) -> Result<()> {
        check_internal(&self.index, id, InternalRole::Cascade)?;
        self.cascade.listeners_mut().add_internal(id)?;
        if self.cascade.is_open() {
            let outcome = self.dispatch_cascade(id, CascadeEdge::Begin);
            return self.poison_on_err(outcome);
        }
        Ok(())
    }

    pub(crate) fn remove_internal_cascade_listener(&mut self, id: EntityId) -> Result<()> {
        self.cascade.listeners_mut().remove_internal(id)
    }

    pub fn add_column_list_listener(&mut self, listener: Arc<dyn ColumnListListener>) -> Result<()> {
        self.columns.listeners.add_external(listener)
    }

    pub fn remove_column_list_listener(&mut self, listener: &Arc<dyn ColumnListListener>) -> Result<()> {
        self.columns.listeners.remove_external(listener)
    }

    pub fn add_vocab_list_listener(&mut self, listener: Arc<dyn VocabListListener>) -> Result<()> {
        self.vocab.listeners.add_external(listener)
    }

    pub fn remove_vocab_list_listener(&mut self, listener: &Arc<dyn VocabListListener>) -> Result<()> {
        self.vocab.listeners.remove_external(listener)
    }

    pub fn add_column_listener(&mut self, col_id: EntityId, listener: Arc<dyn ColumnListener>) -> Result<()> {
        self.column_listener_set(col_id)?.add_external(listener)
    }

    pub fn remove_column_listener(&mut self, col_id: EntityId, listener: &Arc<dyn ColumnListener>) -> Result<()> {
        self.column_listener_set(col_id)?.remove_external(listener)
    }

    pub fn add_vocab_element_listener(
        &mut self,
        ve_id: EntityId,
        listener: Arc<dyn VocabElementListener>,
    ) -> Result<()> {
        self.vocab_listener_set(ve_id)?.add_external(listener)
    }

    pub fn remove_vocab_element_listener(
        &mut self,
        ve_id: EntityId,
        listener: &Arc<dyn VocabElementListener>,
    ) -> Result<()> {
        self.vocab_listener_set(ve_id)?.remove_external(listener)
    }

    /// Register entity `listener_id` for change and deletion events of
    /// vocab element `ve_id`.
    pub(crate) fn add_internal_vocab_element_listener(
        &mut self,
        ve_id: EntityId,
        listener_id: EntityId,
    ) -> Result<()> {
        check_internal(&self.index, listener_id, InternalRole::VocabElement)?;
        self.vocab_listener_set(ve_id)?.add_internal(listener_id)
    }

    pub(crate) fn remove_internal_vocab_element_listener(
        &mut self,
        ve_id: EntityId,
        listener_id: EntityId,
    ) -> Result<()> {
        self.vocab_listener_set(ve_id)?.remove_internal(listener_id)
    }

    pub fn add_cell_listener(&mut self, cell_id: EntityId, listener: Arc<dyn CellListener>) -> Result<()> {
        self.cell_listener_set(cell_id)?.add_external(listener)
    }

    pub fn remove_cell_listener(&mut self, cell_id: EntityId, listener: &Arc<dyn CellListener>) -> Result<()> {
        self.cell_listener_set(cell_id)?.remove_external(listener)
    }

    fn column_listener_set(&mut self, col_id: EntityId) -> Result<&mut ListenerSet<dyn ColumnListener>> {
        if !self.columns.names.contains_id(col_id) {
            return Err(Error::UnknownIdentifier(format!("no column with id {col_id}")));
        }
        self.index
            .column_mut(col_id)?
            .listeners_mut()
            .ok_or_else(|| Error::InvalidArgument(format!("column {col_id} does not accept listeners")))
    }

    fn vocab_listener_set(&mut self, ve_id: EntityId) -> Result<&mut ListenerSet<dyn VocabElementListener>> {
        if !self.vocab.names.contains_id(ve_id) {
            return Err(Error::UnknownIdentifier(format!("no vocab element with id {ve_id}")));
        }
        self.index
            .vocab_mut(ve_id)?
            .listeners_mut()
            .ok_or_else(|| Error::InvariantViolation(format!("vocab element {ve_id} lost its listener set")))
    }

    fn cell_listener_set(&mut self, cell_id: EntityId) -> Result<&mut ListenerSet<dyn CellListener>> {
        self.index
            .cell_mut(cell_id)?
            .listeners_mut()
            .ok_or_else(|| Error::InvariantViolation(format!("cell {cell_id} lost its listener set")))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("columns", &self.columns.names.len())
            .field("vocab", &self.vocab.names.len())
            .field("cascade_depth", &self.cascade.depth())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, INVALID_ID, MatrixType};

    #[test]
    fn failure_inside_cascade_poisons() {
        let mut db = Database::new();
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();

        let outcome: Result<()> =
            db.in_cascade(|_| Err(Error::InvariantViolation("simulated defect".into())));
        assert!(outcome.unwrap_err().is_defect());
        assert!(db.is_poisoned());

        let again = Column::reference(db.id(), "notes").unwrap();
        assert!(matches!(db.add_column(again), Err(Error::InvariantViolation(_))));
        assert!(matches!(db.begin_cascade(), Err(Error::InvariantViolation(_))));

        // Reads keep working for diagnostics.
        assert_eq!(db.column(col).unwrap().name(), "trial");
        assert!(crate::export::snapshot(&db).is_ok());
    }

    #[test]
    fn precondition_failure_does_not_poison() {
        let mut db = Database::new();
        let foreign = Column::reference(DatabaseId(u64::MAX), "notes").unwrap();
        assert!(matches!(db.add_column(foreign), Err(Error::InvalidArgument(_))));
        assert!(!db.is_poisoned());
    }

    #[test]
    fn config_is_validated() {
        let config = DatabaseConfig { ticks_per_second: 0, ..DatabaseConfig::default() };
        assert!(matches!(Database::with_config(config), Err(Error::Config(_))));

        let config = DatabaseConfig { name: "coding".into(), ticks_per_second: 30, ..DatabaseConfig::default() };
        let mut db = Database::with_config(config).unwrap();
        assert_eq!(db.config().name, "coding");
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
        let cell = db.new_cell(col).unwrap();
        assert_eq!(cell.onset().tps(), 30);
    }

    #[test]
    fn internal_registration_is_checked() {
        let mut db = Database::new();
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
        let mve = db.column(col).unwrap().mve_id().unwrap();

        assert!(matches!(db.add_internal_cascade_listener(INVALID_ID), Err(Error::InvalidListener(_))));
        assert!(matches!(db.add_internal_cascade_listener(EntityId(999)), Err(Error::UnknownIdentifier(_))));
        assert!(matches!(
            db.add_internal_cascade_listener(mve),
            Err(Error::NotAnInternalListener { .. })
        ));
        // Already registered when it was inserted.
        assert!(matches!(db.add_internal_cascade_listener(col), Err(Error::InvalidListener(_))));
        assert!(matches!(
            db.add_internal_vocab_element_listener(mve, col),
            Err(Error::InvalidListener(_))
        ));
        assert!(!db.is_poisoned());
    }

    #[test]
    fn internal_bindings_follow_the_column_lifecycle() {
        let mut db = Database::new();
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
        let mve = db.column(col).unwrap().mve_id().unwrap();
        let cell_id = db.append_cell(db.new_cell(col).unwrap()).unwrap();

        assert!(db.cascade.listeners().contains_internal(col));
        let schema = db.vocab_element(mve).unwrap().listeners().unwrap();
        assert_eq!(schema.internal_snapshot().as_slice(), &[col]);

        // Column, cell and list sets only ever hold external handles.
        assert_eq!(db.column(col).unwrap().listeners().unwrap().internal_len(), 0);
        assert_eq!(db.cell(cell_id).unwrap().listeners().unwrap().internal_len(), 0);
        assert_eq!(db.columns.listeners.internal_len(), 0);
        assert_eq!(db.vocab.listeners.internal_len(), 0);

        db.remove_cell(cell_id).unwrap();
        db.remove_column(col).unwrap();
        assert!(!db.cascade.listeners().contains_internal(col));
        assert!(db.cascade.listeners().is_empty());
    }

    #[test]
    fn replaced_column_keeps_cascade_registration() {
        let mut db = Database::new();
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
        let mut hidden = db.column(col).unwrap().clone();
        hidden.set_hidden(true);
        db.replace_column(hidden).unwrap();

        // The replaced instance still answers cascade edges by id.
        db.begin_cascade().unwrap();
        assert!(db.column(col).unwrap().cascade_in_progress());
        db.end_cascade().unwrap();
        assert!(!db.column(col).unwrap().cascade_in_progress());
    }
}
