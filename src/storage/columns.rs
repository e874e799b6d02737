//! Column registry.
//!
//! Registry-level operations (`ColumnListMut`) follow the insert / remove /
//! replace protocol literally and leave the governing matrix vocabulary
//! element to the caller. The `Database::{add,remove,replace}_column`
//! operations coordinate both registries: they create, delete and rename the
//! matrix element together with its column, schema first.

use tracing::debug;

use super::Database;
use super::name_index::NameIndex;
use crate::listeners::{ColumnListListener, ListenerSet};
use crate::model::{
    Column, ColumnChanges, ColumnKind, Element, EntityId, FormalArg, INVALID_ID, InternalRole, VocabElement,
};
use crate::{Error, Result};

pub(crate) struct ColumnRegistry {
    pub(crate) names: NameIndex,
    pub(crate) listeners: ListenerSet<dyn ColumnListListener>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListEvent {
    Inserted,
    Deleted,
}

// ============================================================================
// Views
// ============================================================================

/// Read access to the column list.
#[derive(Clone, Copy)]
pub struct ColumnList<'a> {
    db: &'a Database,
}

impl<'a> ColumnList<'a> {
    pub fn lookup_by_id(&self, id: EntityId) -> Result<&'a Column> {
        if !self.db.columns.names.contains_id(id) {
            return Err(Error::UnknownIdentifier(format!("no column with id {id}")));
        }
        self.db.index.column(id)
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<&'a Column> {
        let id = self
            .db
            .columns
            .names
            .id_of(name)
            .ok_or_else(|| Error::UnknownIdentifier(format!("no column named {name:?}")))?;
        self.db.index.column(id)
    }

    /// Name recorded in the name table for `id`.
    pub fn name_of(&self, id: EntityId) -> Option<&'a str> {
        self.db.columns.names.name_of(id)
    }

    pub fn contains_id(&self, id: EntityId) -> bool {
        self.db.columns.names.contains_id(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.db.columns.names.contains_name(name)
    }

    pub fn len(&self) -> usize {
        self.db.columns.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column ids in insertion order.
    pub fn ids(&self) -> &'a [EntityId] {
        self.db.columns.names.ids()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Column> + use<'a> {
        let db = self.db;
        db.columns.names.ids().iter().filter_map(move |id| db.index.column(*id).ok())
    }
}

/// Registry-level mutation of the column list.
pub struct ColumnListMut<'a> {
    db: &'a mut Database,
}

impl ColumnListMut<'_> {
    /// Insert a column. A data column must already be bound to a matrix
    /// vocabulary element of the same name and type that governs no other
    /// column.
    pub fn insert(&mut self, column: Column) -> Result<EntityId> {
        self.db.insert_column_entry(column)
    }

    /// Remove an empty column. Its matrix vocabulary element stays.
    pub fn remove(&mut self, id: EntityId) -> Result<()> {
        self.db.remove_column_entry(id)
    }

    /// Copy-on-write replace. A rename must already be reflected in the
    /// governing matrix vocabulary element.
    pub fn replace(&mut self, column: Column) -> Result<()> {
        self.db.replace_column_entry(column)
    }

    pub fn list(&self) -> ColumnList<'_> {
        ColumnList { db: self.db }
    }
}

// ============================================================================
// Operations
// ============================================================================

impl Database {
    pub fn columns(&self) -> ColumnList<'_> {
        ColumnList { db: self }
    }

    pub fn columns_mut(&mut self) -> ColumnListMut<'_> {
        ColumnListMut { db: self }
    }

    pub fn column(&self, id: EntityId) -> Result<&Column> {
        self.columns().lookup_by_id(id)
    }

    /// Add a column. An unbound data column gets a fresh matrix vocabulary
    /// element of its name and type, holding one `<val>` argument.
    pub fn add_column(&mut self, column: Column) -> Result<EntityId> {
        self.ensure_usable()?;
        let ColumnKind::Data { mve_id, matrix_type } = *column.kind() else {
            return self.insert_column_entry(column);
        };
        if mve_id.is_valid() {
            return self.insert_column_entry(column);
        }

        self.check_fresh_column(&column)?;
        if self.vocab.names.contains_name(column.name()) {
            return Err(Error::NameConflict(format!("{:?} is already a vocab element", column.name())));
        }
        let mut mve = VocabElement::matrix(self.id, column.name(), matrix_type)?;
        mve.append_farg(FormalArg::new(self.id, FormalArg::DEFAULT_NAME, matrix_type.initial_farg_kind())?)?;

        let mut column = column;
        self.in_cascade(|db| {
            let mve_id = db.insert_vocab_entry(mve)?;
            column.set_mve_id(mve_id)?;
            db.insert_column_entry(column)
        })
    }

    /// Remove an empty column together with its matrix vocabulary element.
    pub fn remove_column(&mut self, id: EntityId) -> Result<()> {
        self.ensure_usable()?;
        let column = self.column(id)?;
        if column.num_cells() > 0 {
            return Err(not_empty(column));
        }
        match column.mve_id() {
            Some(mve_id) if mve_id.is_valid() => self.in_cascade(|db| {
                db.remove_column_entry(id)?;
                db.remove_vocab_entry(mve_id)
            }),
            _ => self.remove_column_entry(id),
        }
    }

    /// Replace a column. A data column rename is applied to the matrix
    /// vocabulary element first, which renames the column in turn.
    pub fn replace_column(&mut self, column: Column) -> Result<()> {
        self.ensure_usable()?;
        let renamed = self.check_column_replace(&column, true)?;
        let Some(mve_id) = column.mve_id().filter(|_| renamed) else {
            return self.replace_column_entry(column);
        };

        let mut mve = self.index.vocab(mve_id)?.clone();
        mve.set_name(column.name())?;
        self.in_cascade(|db| {
            db.replace_vocab_entry(mve)?;
            db.replace_column_entry(column)
        })
    }

    // ========================================================================
    // Registry protocol
    // ========================================================================

    pub(crate) fn insert_column_entry(&mut self, column: Column) -> Result<EntityId> {
        self.ensure_usable()?;
        self.check_fresh_column(&column)?;
        match *column.kind() {
            ColumnKind::Reference => {
                if self.vocab.names.contains_name(column.name()) {
                    return Err(Error::NameConflict(format!(
                        "{:?} is already a vocab element",
                        column.name()
                    )));
                }
            }
            ColumnKind::Data { mve_id, matrix_type } => {
                if !mve_id.is_valid() {
                    return Err(Error::InvalidArgument(format!(
                        "data column {} has no matrix vocab element",
                        column.name()
                    )));
                }
                let mve = self.index.vocab(mve_id).map_err(|_| {
                    Error::InvalidArgument(format!("matrix vocab element {mve_id} does not exist"))
                })?;
                if mve.matrix_type() != Some(matrix_type) {
                    return Err(Error::InvalidArgument(format!(
                        "column {} is {matrix_type} but vocab element {} is not",
                        column.name(),
                        mve.name()
                    )));
                }
                if mve.name() != column.name() {
                    return Err(Error::InvalidArgument(format!(
                        "column {} and its vocab element {} disagree on the name",
                        column.name(),
                        mve.name()
                    )));
                }
                if mve.col_id().is_valid() {
                    return Err(Error::InvalidArgument(format!(
                        "vocab element {} already governs column {}",
                        mve.name(),
                        mve.col_id()
                    )));
                }
            }
        }

        let name = column.name().to_string();
        let mve_id = column.mve_id();
        let mut column = column;
        column.init_cells();
        if column.is_data() {
            column.set_listeners(Some(ListenerSet::new(InternalRole::Column)));
        }
        let id = self.in_cascade(move |db| {
            let id = db.index.add(column)?;
            db.columns.names.insert(id, &name)?;
            if let Some(mve_id) = mve_id {
                db.index.vocab_mut(mve_id)?.set_col_id(id);
                db.add_internal_vocab_element_listener(mve_id, id)?;
            }
            debug!(db = %db.id, column = %id, %name, "column inserted");
            db.notify_column_list(id, ListEvent::Inserted);
            Ok(id)
        })?;

        let registered = self.add_internal_cascade_listener(id);
        self.poison_on_err(registered)?;
        Ok(id)
    }

    pub(crate) fn remove_column_entry(&mut self, id: EntityId) -> Result<()> {
        self.ensure_usable()?;
        let column = self.column(id)?;
        if column.num_cells() > 0 {
            return Err(not_empty(column));
        }
        let mve_id = column.mve_id().filter(|m| m.is_valid());

        self.in_cascade(|db| {
            db.notify_column_deleted(id)?;
            db.index.column_mut(id)?.set_listeners(None);
            db.notify_column_list(id, ListEvent::Deleted);
            if let Some(mve_id) = mve_id {
                db.index.vocab_mut(mve_id)?.set_col_id(INVALID_ID);
                db.remove_internal_vocab_element_listener(mve_id, id)?;
            }
            db.index.remove(id)?;
            let name = db.columns.names.remove(id)?;
            db.remove_internal_cascade_listener(id)?;
            debug!(db = %db.id, column = %id, %name, "column removed");
            Ok(())
        })
    }

    pub(crate) fn replace_column_entry(&mut self, column: Column) -> Result<()> {
        self.ensure_usable()?;
        let renamed = self.check_column_replace(&column, false)?;
        let id = column.id();

        self.in_cascade(|db| {
            let Element::Column(mut retired) = db.index.replace(column)? else {
                return Err(Error::InvariantViolation(format!("{id} stopped being a column")));
            };
            let current = db.index.column_mut(id)?;
            current.adopt_substructure(&mut retired);
            let changes = ColumnChanges::between(&retired, current);
            if renamed {
                db.columns.names.rename(id, current.name())?;
            }
            debug!(db = %db.id, column = %id, "column replaced");
            if let Some(changes) = changes {
                db.notify_column_changed(id, &changes);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Preconditions
    // ========================================================================

    fn check_fresh_column(&self, column: &Column) -> Result<()> {
        if column.db() != self.id {
            return Err(Error::InvalidArgument(format!("column {} belongs to {}", column.name(), column.db())));
        }
        if column.id().is_valid() {
            return Err(Error::InvalidArgument(format!(
                "column {} is already registered as {}",
                column.name(),
                column.id()
            )));
        }
        if column.has_cell_storage() {
            return Err(Error::InvalidArgument(format!("column {} already carries cells", column.name())));
        }
        if self.columns.names.contains_name(column.name()) {
            return Err(Error::NameConflict(format!("{:?} is already a column", column.name())));
        }
        Ok(())
    }

    /// Checks shared by both replace paths. With `schema_follows`, a data
    /// column rename is about to be pushed into the vocab element, so the
    /// vocab name only has to be free. Returns whether the name changes.
    fn check_column_replace(&self, column: &Column, schema_follows: bool) -> Result<bool> {
        let id = column.id();
        if column.db() != self.id {
            return Err(Error::InvalidArgument(format!("column {} belongs to {}", column.name(), column.db())));
        }
        if !id.is_valid() {
            return Err(Error::InvalidArgument(format!("column {} has no id", column.name())));
        }
        let old = self.column(id)?;
        if std::mem::discriminant(old.kind()) != std::mem::discriminant(column.kind()) {
            return Err(Error::TypeMismatch {
                expected: kind_name(old.kind()).into(),
                got: kind_name(column.kind()).into(),
            });
        }
        if old.kind() != column.kind() {
            return Err(Error::InvariantViolation(format!(
                "column {id} cannot change its matrix vocab element or type"
            )));
        }

        let renamed = old.name() != column.name();
        if !renamed {
            return Ok(false);
        }
        if self.columns.names.contains_name(column.name()) {
            return Err(Error::NameConflict(format!("{:?} is already a column", column.name())));
        }
        match column.mve_id() {
            None => {
                if self.vocab.names.contains_name(column.name()) {
                    return Err(Error::NameConflict(format!(
                        "{:?} is already a vocab element",
                        column.name()
                    )));
                }
            }
            Some(_) if schema_follows => {
                if self.vocab.names.contains_name(column.name()) {
                    return Err(Error::NameConflict(format!(
                        "{:?} is already a vocab element",
                        column.name()
                    )));
                }
            }
            Some(mve_id) => {
                let mve = self.index.vocab(mve_id)?;
                if mve.name() != column.name() {
                    return Err(Error::OutOfSync(format!(
                        "vocab element {mve_id} is still named {:?}, rename it before column {id}",
                        mve.name()
                    )));
                }
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Notification (column and list listener sets are external-only)
    // ========================================================================

    pub(super) fn notify_column_list(&self, col_id: EntityId, event: ListEvent) {
        for listener in &self.columns.listeners.external_snapshot() {
            match event {
                ListEvent::Inserted => listener.on_column_inserted(self, col_id),
                ListEvent::Deleted => listener.on_column_deleted(self, col_id),
            }
        }
    }

    fn notify_column_changed(&self, col_id: EntityId, changes: &ColumnChanges) {
        let Some(listeners) = self.index.column(col_id).ok().and_then(Column::listeners) else {
            return;
        };
        for listener in &listeners.external_snapshot() {
            listener.on_column_changed(self, col_id, changes);
        }
    }

    fn notify_column_deleted(&self, col_id: EntityId) -> Result<()> {
        if let Some(listeners) = self.index.column(col_id)?.listeners() {
            for listener in &listeners.external_snapshot() {
                listener.on_column_deleted(self, col_id);
            }
        }
        Ok(())
    }

    pub(super) fn notify_column_cell_event(&self, col_id: EntityId, cell_id: EntityId, event: ListEvent) {
        let Some(listeners) = self.index.column(col_id).ok().and_then(Column::listeners) else {
            return;
        };
        for listener in &listeners.external_snapshot() {
            match event {
                ListEvent::Inserted => listener.on_cell_inserted(self, col_id, cell_id),
                ListEvent::Deleted => listener.on_cell_deleted(self, col_id, cell_id),
            }
        }
    }
}

fn not_empty(column: &Column) -> Error {
    Error::NotEmpty(format!("column {} still holds {} cells", column.name(), column.num_cells()))
}

fn kind_name(kind: &ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Data { .. } => "data column",
        ColumnKind::Reference => "reference column",
    }
}
