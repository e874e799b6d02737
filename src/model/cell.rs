//! Time-coded data cells.

use serde::Serialize;

use super::element::{ElementKind, Entity};
use super::id::{DatabaseId, EntityId, INVALID_ID};
use super::time_stamp::TimeStamp;
use super::value::{DataValue, Value};
use crate::listeners::{CellListener, ListenerSet};
use crate::{Error, Result};

/// One row of a data column: an interval plus one value per argument of
/// the column's matrix vocabulary element.
#[derive(Debug, Clone, Serialize)]
pub struct DataCell {
    id: EntityId,
    db: DatabaseId,
    col_id: EntityId,
    mve_id: EntityId,
    onset: TimeStamp,
    offset: TimeStamp,
    comment: String,
    values: Vec<DataValue>,
    #[serde(skip)]
    listeners: Option<ListenerSet<dyn CellListener>>,
}

impl DataCell {
    /// An empty cell for column `col_id`. Values left empty are filled with
    /// each argument's empty value on append.
    pub fn new(db: DatabaseId, col_id: EntityId) -> Self {
        Self {
            id: INVALID_ID,
            db,
            col_id,
            mve_id: INVALID_ID,
            onset: TimeStamp::default(),
            offset: TimeStamp::default(),
            comment: String::new(),
            values: Vec::new(),
            listeners: None,
        }
    }

    pub fn with_onset(mut self, onset: TimeStamp) -> Self {
        self.onset = onset;
        self
    }

    pub fn with_offset(mut self, offset: TimeStamp) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Unbound values, bound positionally on append.
    pub fn with_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.values = values.into_iter().map(DataValue::new).collect();
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn db(&self) -> DatabaseId {
        self.db
    }

    pub fn col_id(&self) -> EntityId {
        self.col_id
    }

    pub fn mve_id(&self) -> EntityId {
        self.mve_id
    }

    pub fn onset(&self) -> TimeStamp {
        self.onset
    }

    pub fn offset(&self) -> TimeStamp {
        self.offset
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn set_onset(&mut self, onset: TimeStamp) {
        self.onset = onset;
    }

    pub fn set_offset(&mut self, offset: TimeStamp) {
        self.offset = offset;
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Set the value in slot `index`, clamped into its argument's subrange.
    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.values.len();
        self.values
            .get_mut(index)
            .ok_or_else(|| Error::InvalidArgument(format!("value index {index} out of bounds ({len})")))?
            .set_value(value)
    }

    pub(crate) fn set_mve_id(&mut self, mve_id: EntityId) {
        self.mve_id = mve_id;
    }

    pub(crate) fn set_values(&mut self, values: Vec<DataValue>) {
        self.values = values;
        let id = self.id;
        for value in &mut self.values {
            value.set_cell_id(id);
        }
    }

    pub(crate) fn listeners(&self) -> Option<&ListenerSet<dyn CellListener>> {
        self.listeners.as_ref()
    }

    pub(crate) fn listeners_mut(&mut self) -> Option<&mut ListenerSet<dyn CellListener>> {
        self.listeners.as_mut()
    }

    pub(crate) fn take_listeners(&mut self) -> Option<ListenerSet<dyn CellListener>> {
        self.listeners.take()
    }

    pub(crate) fn set_listeners(&mut self, listeners: Option<ListenerSet<dyn CellListener>>) {
        self.listeners = listeners;
    }
}

impl Entity for DataCell {
    fn id(&self) -> EntityId {
        self.id
    }

    fn db(&self) -> DatabaseId {
        self.db
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Cell
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

/// Field-level diff of a cell replace.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CellChanges {
    pub onset: Option<(TimeStamp, TimeStamp)>,
    pub offset: Option<(TimeStamp, TimeStamp)>,
    pub comment: Option<(String, String)>,
    pub values: Option<(Vec<DataValue>, Vec<DataValue>)>,
}

impl CellChanges {
    pub(crate) fn between(old: &DataCell, new: &DataCell) -> Option<Self> {
        let changes = Self {
            onset: (old.onset != new.onset).then_some((old.onset, new.onset)),
            offset: (old.offset != new.offset).then_some((old.offset, new.offset)),
            comment: (old.comment != new.comment).then(|| (old.comment.clone(), new.comment.clone())),
            values: (old.values != new.values).then(|| (old.values.clone(), new.values.clone())),
        };
        (!changes.is_empty()).then_some(changes)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fold a later change of the same cell into this one: the oldest
    /// before-value and the newest after-value survive, and fields that
    /// ended where they started drop out.
    pub(crate) fn merge(&mut self, later: CellChanges) {
        merge_field(&mut self.onset, later.onset);
        merge_field(&mut self.offset, later.offset);
        merge_field(&mut self.comment, later.comment);
        merge_field(&mut self.values, later.values);
    }
}

fn merge_field<T: PartialEq>(earlier: &mut Option<(T, T)>, later: Option<(T, T)>) {
    *earlier = match (earlier.take(), later) {
        (Some((first, _)), Some((_, last))) => (first != last).then_some((first, last)),
        (Some(kept), None) => Some(kept),
        (None, later) => later,
    };
}
