//! Columns as internal listeners.
//!
//! A data column follows two event streams: cascade edges (it queues cell
//! change notifications while a cascade is open and flushes them when it
//! closes) and changes of its matrix vocab element (it renames itself and
//! rebinds the values of every cell).

use tracing::{debug, trace};

use super::{CascadeEdge, Database};
use crate::model::{DataValue, EntityId, FargListDiff, VocabChanges};
use crate::{Error, Result};

impl Database {
    pub(crate) fn column_cascade_edge(&mut self, col_id: EntityId, edge: CascadeEdge) -> Result<()> {
        match edge {
            CascadeEdge::Begin => {
                let state = self.index.column_mut(col_id)?.cascade_mut();
                if state.in_progress {
                    return Err(Error::InvariantViolation(format!(
                        "column {col_id} saw a second cascade begin"
                    )));
                }
                state.in_progress = true;
                Ok(())
            }
            CascadeEdge::End => {
                let pending = {
                    let state = self.index.column_mut(col_id)?.cascade_mut();
                    if !state.in_progress {
                        return Err(Error::InvariantViolation(format!(
                            "column {col_id} saw a cascade end without a begin"
                        )));
                    }
                    state.in_progress = false;
                    std::mem::take(&mut state.pending)
                };
                if self.config.temporal_ordering {
                    self.sort_cells_by_onset(col_id)?;
                }
                if !pending.is_empty() {
                    trace!(db = %self.id, column = %col_id, cells = pending.len(), "flushing cell changes");
                }
                for (cell_id, changes) in pending {
                    if changes.is_empty() || !self.index.contains(cell_id) {
                        continue;
                    }
                    self.notify_cell_changed(cell_id, &changes);
                }
                Ok(())
            }
        }
    }

    /// Stable sort, so cells sharing an onset keep their insertion order.
    fn sort_cells_by_onset(&mut self, col_id: EntityId) -> Result<()> {
        let mut keyed = Vec::new();
        for cell_id in self.index.column(col_id)?.cells() {
            keyed.push((self.index.cell(*cell_id)?.onset(), *cell_id));
        }
        if keyed.is_sorted_by(|a, b| a.0 <= b.0) {
            return Ok(());
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(cells) = self.index.column_mut(col_id)?.cells_mut() {
            *cells = keyed.into_iter().map(|(_, id)| id).collect();
        }
        Ok(())
    }

    pub(crate) fn column_on_vocab_changed(
        &mut self,
        col_id: EntityId,
        ve_id: EntityId,
        changes: &VocabChanges,
    ) -> Result<()> {
        let column = self.index.column(col_id)?;
        if column.mve_id() != Some(ve_id) {
            return Err(Error::InvariantViolation(format!(
                "column {col_id} notified about vocab element {ve_id} it does not follow"
            )));
        }
        if !column.cascade_in_progress() {
            return Err(Error::InvariantViolation(format!(
                "column {col_id} notified about its schema outside a cascade"
            )));
        }

        if let Some((_, new_name)) = &changes.name {
            let mut renamed = column.clone();
            renamed.set_name(new_name.as_str())?;
            self.replace_column_entry(renamed)?;
        }

        if let Some(diff) = &changes.fargs {
            let cells = self.index.column(col_id)?.cells().to_vec();
            debug!(db = %self.id, column = %col_id, cells = cells.len(), "rebinding cells to new schema");
            for cell_id in cells {
                self.rebind_cell_values(cell_id, diff)?;
            }
        }
        Ok(())
    }

    /// Kept arguments update their value in place. A new argument at
    /// position `i` salvages the old value at `i` when that old argument
    /// was dropped, and starts empty otherwise.
    fn rebind_cell_values(&mut self, cell_id: EntityId, diff: &FargListDiff) -> Result<()> {
        let cell = self.index.cell(cell_id)?;
        let old_values = cell.values();
        if old_values.len() != diff.old.len() {
            return Err(Error::InvariantViolation(format!(
                "cell {cell_id} holds {} values for {} arguments",
                old_values.len(),
                diff.old.len()
            )));
        }

        let mut values: Vec<DataValue> = Vec::with_capacity(diff.new.len());
        for (i, farg) in diff.new.iter().enumerate() {
            let value = match diff.new_to_old[i] {
                Some(j) => {
                    let change = &diff.changes[i];
                    let mut value = old_values[j].clone();
                    value.update_for_farg_change(
                        change.name_changed,
                        change.subrange_changed,
                        change.range_changed,
                        &diff.old[j],
                        farg,
                    )?;
                    value
                }
                None => {
                    let salvage = diff
                        .old_to_new
                        .get(i)
                        .filter(|kept| kept.is_none())
                        .and(old_values.get(i));
                    farg.construct_arg_with_salvage(salvage)
                }
            };
            values.push(value);
        }

        if values.as_slice() == old_values {
            return Ok(());
        }
        let mut updated = cell.clone();
        updated.set_values(values);
        self.replace_cell_entry(updated)
    }
}
