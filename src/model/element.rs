//! The registry-to-entity contract and the closed set of registrable kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::cell::DataCell;
use super::column::Column;
use super::formal_arg::FormalArg;
use super::id::{DatabaseId, EntityId};
use super::vocab::VocabElement;

/// Kind of a registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Column,
    VocabElement,
    FormalArg,
    Cell,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::Column => "column",
            ElementKind::VocabElement => "vocab element",
            ElementKind::FormalArg => "formal argument",
            ElementKind::Cell => "cell",
        };
        f.write_str(s)
    }
}

/// Which listener set an internal listener is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InternalRole {
    Cascade,
    ColumnList,
    VocabList,
    Column,
    VocabElement,
    Cell,
}

impl fmt::Display for InternalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InternalRole::Cascade => "cascade",
            InternalRole::ColumnList => "column list",
            InternalRole::VocabList => "vocab list",
            InternalRole::Column => "column",
            InternalRole::VocabElement => "vocab element",
            InternalRole::Cell => "cell",
        };
        f.write_str(s)
    }
}

/// What every registrable entity exposes to the identity registry.
pub trait Entity {
    fn id(&self) -> EntityId;
    fn db(&self) -> DatabaseId;
    fn kind(&self) -> ElementKind;

    fn entity_name(&self) -> Option<&str> {
        None
    }

    /// Set by the identity registry, once.
    fn assign_id(&mut self, id: EntityId);

    /// Whether this entity can be registered as an internal listener in `role`.
    fn supports(&self, _role: InternalRole) -> bool {
        false
    }
}

/// A registered entity.
#[derive(Debug, Clone)]
pub enum Element {
    Column(Column),
    Vocab(VocabElement),
    FormalArg(FormalArg),
    Cell(DataCell),
}

impl Element {
    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Element::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_vocab(&self) -> Option<&VocabElement> {
        match self {
            Element::Vocab(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_farg(&self) -> Option<&FormalArg> {
        match self {
            Element::FormalArg(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&DataCell> {
        match self {
            Element::Cell(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_column_mut(&mut self) -> Option<&mut Column> {
        match self {
            Element::Column(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_vocab_mut(&mut self) -> Option<&mut VocabElement> {
        match self {
            Element::Vocab(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_cell_mut(&mut self) -> Option<&mut DataCell> {
        match self {
            Element::Cell(c) => Some(c),
            _ => None,
        }
    }

    fn entity(&self) -> &dyn Entity {
        match self {
            Element::Column(c) => c,
            Element::Vocab(v) => v,
            Element::FormalArg(f) => f,
            Element::Cell(c) => c,
        }
    }

    fn entity_mut(&mut self) -> &mut dyn Entity {
        match self {
            Element::Column(c) => c,
            Element::Vocab(v) => v,
            Element::FormalArg(f) => f,
            Element::Cell(c) => c,
        }
    }
}

impl Entity for Element {
    fn id(&self) -> EntityId {
        self.entity().id()
    }

    fn db(&self) -> DatabaseId {
        self.entity().db()
    }

    fn kind(&self) -> ElementKind {
        self.entity().kind()
    }

    fn entity_name(&self) -> Option<&str> {
        self.entity().entity_name()
    }

    fn assign_id(&mut self, id: EntityId) {
        self.entity_mut().assign_id(id);
    }

    fn supports(&self, role: InternalRole) -> bool {
        self.entity().supports(role)
    }
}

impl From<Column> for Element {
    fn from(c: Column) -> Self {
        Element::Column(c)
    }
}

impl From<VocabElement> for Element {
    fn from(v: VocabElement) -> Self {
        Element::Vocab(v)
    }
}

impl From<FormalArg> for Element {
    fn from(f: FormalArg) -> Self {
        Element::FormalArg(f)
    }
}

impl From<DataCell> for Element {
    fn from(c: DataCell) -> Self {
        Element::Cell(c)
    }
}
