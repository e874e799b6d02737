//! Cell operations on data columns.
//!
//! Cell edits are not announced right away. Each change is folded into the
//! owning column's pending queue and delivered once, when the enclosing
//! cascade closes.

use tracing::debug;

use super::Database;
use super::columns::ListEvent;
use crate::listeners::ListenerSet;
use crate::model::{CellChanges, DataCell, DataValue, Element, EntityId, InternalRole, TimeStamp, VocabElement};
use crate::{Error, Result};

impl Database {
    /// An empty cell for `col_id` with onset and offset at zero in the
    /// configured tick rate. `col_id` must name a writable data column.
    pub fn new_cell(&self, col_id: EntityId) -> Result<DataCell> {
        self.writable_data_column(col_id)?;
        let zero = TimeStamp::zero(self.config.ticks_per_second)?;
        Ok(DataCell::new(self.id, col_id).with_onset(zero).with_offset(zero))
    }

    pub fn cell(&self, id: EntityId) -> Result<&DataCell> {
        self.index.cell(id)
    }

    /// Cells of `col_id` in column order.
    pub fn cells(&self, col_id: EntityId) -> Result<impl Iterator<Item = &DataCell> + '_> {
        let column = self.column(col_id)?;
        Ok(column.cells().iter().filter_map(|id| self.index.cell(*id).ok()))
    }

    /// Append a cell to its column. Values are bound positionally to the
    /// column's arguments; a cell without values gets the empty value of
    /// every argument.
    pub fn append_cell(&mut self, cell: DataCell) -> Result<EntityId> {
        self.ensure_usable()?;
        if cell.db() != self.id {
            return Err(Error::InvalidArgument(format!("cell belongs to {}", cell.db())));
        }
        if cell.id().is_valid() {
            return Err(Error::InvalidArgument(format!("cell is already registered as {}", cell.id())));
        }
        let col_id = cell.col_id();
        let mve_id = self.writable_data_column(col_id)?;
        let values = bind_values(self.index.vocab(mve_id)?, cell.values())?;

        let mut cell = cell;
        cell.set_mve_id(mve_id);
        cell.set_listeners(Some(ListenerSet::new(InternalRole::Cell)));
        self.in_cascade(move |db| {
            let id = db.index.add(cell)?;
            db.index.cell_mut(id)?.set_values(values);
            db.index
                .column_mut(col_id)?
                .cells_mut()
                .ok_or_else(|| Error::InvariantViolation(format!("data column {col_id} has no cell storage")))?
                .push(id);
            debug!(db = %db.id, column = %col_id, cell = %id, "cell appended");
            db.notify_column_cell_event(col_id, id, ListEvent::Inserted);
            Ok(id)
        })
    }

    /// Copy-on-write replace of a cell. Cells cannot move between columns.
    pub fn replace_cell(&mut self, cell: DataCell) -> Result<()> {
        self.ensure_usable()?;
        if cell.db() != self.id {
            return Err(Error::InvalidArgument(format!("cell belongs to {}", cell.db())));
        }
        let old = self.cell(cell.id())?;
        if old.col_id() != cell.col_id() {
            return Err(Error::InvalidArgument(format!(
                "cell {} cannot move from column {} to {}",
                cell.id(),
                old.col_id(),
                cell.col_id()
            )));
        }
        let mve_id = self.writable_data_column(cell.col_id())?;
        let values = bind_values(self.index.vocab(mve_id)?, cell.values())?;

        let mut cell = cell;
        cell.set_mve_id(mve_id);
        cell.set_values(values);
        self.replace_cell_entry(cell)
    }

    pub fn remove_cell(&mut self, id: EntityId) -> Result<()> {
        self.ensure_usable()?;
        let col_id = self.cell(id)?.col_id();
        self.writable_data_column(col_id)?;

        self.in_cascade(|db| {
            db.notify_cell_deleted(id)?;
            db.index.cell_mut(id)?.set_listeners(None);
            let column = db.index.column_mut(col_id)?;
            column.cascade_mut().pending.retain(|(cell_id, _)| *cell_id != id);
            if let Some(cells) = column.cells_mut() {
                cells.retain(|cell_id| *cell_id != id);
            }
            db.notify_column_cell_event(col_id, id, ListEvent::Deleted);
            db.index.remove(id)?;
            debug!(db = %db.id, column = %col_id, cell = %id, "cell removed");
            Ok(())
        })
    }

    /// Registry half of a cell replace. Values must already be bound.
    /// Also used by schema propagation, which ignores the read-only flag.
    pub(super) fn replace_cell_entry(&mut self, cell: DataCell) -> Result<()> {
        let id = cell.id();
        let col_id = cell.col_id();
        self.in_cascade(|db| {
            let Element::Cell(mut retired) = db.index.replace(cell)? else {
                return Err(Error::InvariantViolation(format!("{id} stopped being a cell")));
            };
            let current = db.index.cell_mut(id)?;
            current.set_listeners(retired.take_listeners());
            if let Some(changes) = CellChanges::between(&retired, current) {
                db.queue_cell_change(col_id, id, changes)?;
            }
            Ok(())
        })
    }

    fn queue_cell_change(&mut self, col_id: EntityId, cell_id: EntityId, changes: CellChanges) -> Result<()> {
        let state = self.index.column_mut(col_id)?.cascade_mut();
        if !state.in_progress {
            return Err(Error::InvariantViolation(format!(
                "cell {cell_id} changed while column {col_id} is outside a cascade"
            )));
        }
        match state.pending.iter_mut().find(|(id, _)| *id == cell_id) {
            Some((_, queued)) => queued.merge(changes),
            None => state.pending.push((cell_id, changes)),
        }
        Ok(())
    }

    /// The governing vocab element of a data column that accepts cell edits.
    fn writable_data_column(&self, col_id: EntityId) -> Result<EntityId> {
        let column = self.column(col_id)?;
        let Some(mve_id) = column.mve_id() else {
            return Err(Error::TypeMismatch {
                expected: "data column".into(),
                got: "reference column".into(),
            });
        };
        if column.read_only() {
            return Err(Error::InvalidArgument(format!("column {} is read-only", column.name())));
        }
        Ok(mve_id)
    }

    // ========================================================================
    // Notification (cell listener sets are external-only)
    // ========================================================================

    pub(super) fn notify_cell_changed(&self, cell_id: EntityId, changes: &CellChanges) {
        let Some(listeners) = self.index.cell(cell_id).ok().and_then(DataCell::listeners) else {
            return;
        };
        for listener in &listeners.external_snapshot() {
            listener.on_cell_changed(self, cell_id, changes);
        }
    }

    fn notify_cell_deleted(&self, cell_id: EntityId) -> Result<()> {
        if let Some(listeners) = self.index.cell(cell_id)?.listeners() {
            for listener in &listeners.external_snapshot() {
                listener.on_cell_deleted(self, cell_id);
            }
        }
        Ok(())
    }
}

fn bind_values(mve: &VocabElement, values: &[DataValue]) -> Result<Vec<DataValue>> {
    if values.is_empty() {
        return Ok(mve.fargs().iter().map(|farg| farg.construct_empty_arg()).collect());
    }
    if values.len() != mve.num_fargs() {
        return Err(Error::InvalidArgument(format!(
            "{} takes {} values, got {}",
            mve.name(),
            mve.num_fargs(),
            values.len()
        )));
    }
    mve.fargs().iter().zip(values).map(|(farg, value)| farg.bind(value)).collect()
}
