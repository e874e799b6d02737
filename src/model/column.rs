//! Columns of the spreadsheet.

use serde::Serialize;

use super::cell::CellChanges;
use super::element::{ElementKind, Entity, InternalRole};
use super::id::{DatabaseId, EntityId, INVALID_ID};
use super::names::is_valid_svar_name;
use super::vocab::MatrixType;
use crate::listeners::{ColumnListener, ListenerSet};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ColumnKind {
    /// Cells shaped by the matrix vocabulary element `mve_id`.
    Data { mve_id: EntityId, matrix_type: MatrixType },
    /// Named placeholder without schema or cells.
    Reference,
}

/// Per-cascade bookkeeping of a column acting as internal cascade listener.
#[derive(Debug, Clone, Default)]
pub(crate) struct CascadeState {
    pub(crate) in_progress: bool,
    /// Cell changes queued until the cascade closes, in first-change order.
    pub(crate) pending: Vec<(EntityId, CellChanges)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    id: EntityId,
    db: DatabaseId,
    name: String,
    kind: ColumnKind,
    hidden: bool,
    read_only: bool,
    cells: Option<Vec<EntityId>>,
    #[serde(skip)]
    listeners: Option<ListenerSet<dyn ColumnListener>>,
    #[serde(skip)]
    cascade: CascadeState,
}

impl Column {
    /// A data column. Its schema element is created alongside it by
    /// `Database::add_column`, or bound with [`Column::set_mve_id`].
    pub fn data(db: DatabaseId, name: impl Into<String>, matrix_type: MatrixType) -> Result<Self> {
        Self::build(db, name.into(), ColumnKind::Data { mve_id: INVALID_ID, matrix_type })
    }

    pub fn reference(db: DatabaseId, name: impl Into<String>) -> Result<Self> {
        Self::build(db, name.into(), ColumnKind::Reference)
    }

    fn build(db: DatabaseId, name: String, kind: ColumnKind) -> Result<Self> {
        if !is_valid_svar_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid column name")));
        }
        Ok(Self {
            id: INVALID_ID,
            db,
            name,
            kind,
            hidden: false,
            read_only: false,
            cells: None,
            listeners: None,
            cascade: CascadeState::default(),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn db(&self) -> DatabaseId {
        self.db
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, ColumnKind::Data { .. })
    }

    pub fn mve_id(&self) -> Option<EntityId> {
        match self.kind {
            ColumnKind::Data { mve_id, .. } => Some(mve_id),
            ColumnKind::Reference => None,
        }
    }

    pub fn matrix_type(&self) -> Option<MatrixType> {
        match self.kind {
            ColumnKind::Data { matrix_type, .. } => Some(matrix_type),
            ColumnKind::Reference => None,
        }
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Cell ids in column order.
    pub fn cells(&self) -> &[EntityId] {
        self.cells.as_deref().unwrap_or_default()
    }

    pub fn num_cells(&self) -> usize {
        self.cells().len()
    }

    /// True between the begin and end notifications of a cascade.
    pub fn cascade_in_progress(&self) -> bool {
        self.cascade.in_progress
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_valid_svar_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid column name")));
        }
        self.name = name;
        Ok(())
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Bind an unregistered data column to an existing matrix element.
    pub fn set_mve_id(&mut self, id: EntityId) -> Result<()> {
        match &mut self.kind {
            ColumnKind::Data { mve_id, .. } => {
                *mve_id = id;
                Ok(())
            }
            ColumnKind::Reference => Err(Error::TypeMismatch {
                expected: "data column".into(),
                got: "reference column".into(),
            }),
        }
    }

    pub(crate) fn has_cell_storage(&self) -> bool {
        self.cells.is_some()
    }

    pub(crate) fn init_cells(&mut self) {
        self.cells = Some(Vec::new());
    }

    pub(crate) fn cells_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        self.cells.as_mut()
    }

    pub(crate) fn cascade_mut(&mut self) -> &mut CascadeState {
        &mut self.cascade
    }

    pub(crate) fn listeners(&self) -> Option<&ListenerSet<dyn ColumnListener>> {
        self.listeners.as_ref()
    }

    pub(crate) fn listeners_mut(&mut self) -> Option<&mut ListenerSet<dyn ColumnListener>> {
        self.listeners.as_mut()
    }

    pub(crate) fn set_listeners(&mut self, listeners: Option<ListenerSet<dyn ColumnListener>>) {
        self.listeners = listeners;
    }

    /// Move cells, listeners and cascade bookkeeping from the retired
    /// instance `old` into `self`, leaving `old` empty.
    pub(crate) fn adopt_substructure(&mut self, old: &mut Column) {
        self.cells = old.cells.take();
        self.listeners = old.listeners.take();
        self.cascade = std::mem::take(&mut old.cascade);
    }
}

impl Entity for Column {
    fn id(&self) -> EntityId {
        self.id
    }

    fn db(&self) -> DatabaseId {
        self.db
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Column
    }

    fn entity_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Every column tracks cascades; data columns also follow their schema.
    fn supports(&self, role: InternalRole) -> bool {
        match role {
            InternalRole::Cascade => true,
            InternalRole::VocabElement => self.is_data(),
            _ => false,
        }
    }
}

/// Field-level diff of a column replace.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnChanges {
    pub name: Option<(String, String)>,
    pub hidden: Option<(bool, bool)>,
    pub read_only: Option<(bool, bool)>,
}

impl ColumnChanges {
    pub(crate) fn between(old: &Column, new: &Column) -> Option<Self> {
        let changes = Self {
            name: (old.name != new.name).then(|| (old.name.clone(), new.name.clone())),
            hidden: (old.hidden != new.hidden).then_some((old.hidden, new.hidden)),
            read_only: (old.read_only != new.read_only).then_some((old.read_only, new.read_only)),
        };
        (changes != Self::default()).then_some(changes)
    }
}
