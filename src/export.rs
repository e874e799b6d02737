//! JSON dump of a database, for diagnostics and golden-file tests.
//!
//! ```text
//! Database → snapshot() → { config, vocab, columns, cells }
//!   → export_json() adds database id + generation time
//! ```
//!
//! Listener registrations and cascade bookkeeping are not part of the dump.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::config::DatabaseConfig;
use crate::model::{Column, DataCell, DatabaseId, VocabElement};
use crate::storage::Database;

#[derive(Serialize)]
struct Contents<'a> {
    config: &'a DatabaseConfig,
    vocab: Vec<&'a VocabElement>,
    columns: Vec<&'a Column>,
    cells: Vec<&'a DataCell>,
}

#[derive(Serialize)]
struct Dump<'a> {
    database: DatabaseId,
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    contents: Contents<'a>,
}

fn contents(db: &Database) -> Contents<'_> {
    let columns: Vec<&Column> = db.columns().iter().collect();
    let cells = columns
        .iter()
        .copied()
        .flat_map(Column::cells)
        .filter_map(|id| db.cell(*id).ok())
        .collect();
    Contents {
        config: db.config(),
        vocab: db.vocab().iter().collect(),
        columns,
        cells,
    }
}

/// Structural contents as a JSON value: vocabulary and columns in
/// insertion order, cells in column order. Two databases holding the same
/// entities under the same ids produce equal snapshots.
pub fn snapshot(db: &Database) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(contents(db))?)
}

/// Write the pretty-printed dump of `db` to `writer`.
pub fn export_json(db: &Database, writer: &mut dyn Write) -> Result<()> {
    let dump = Dump {
        database: db.id(),
        generated_at: Utc::now(),
        contents: contents(db),
    };
    serde_json::to_writer_pretty(&mut *writer, &dump)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatrixType, Value};

    #[test]
    fn dump_lists_entities_in_order() {
        let mut db = Database::new();
        let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
        let cell = db.new_cell(col).unwrap().with_values([7i64]);
        db.append_cell(cell).unwrap();

        let mut out = Vec::new();
        export_json(&db, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(parsed["vocab"][0]["name"], "trial");
        assert_eq!(parsed["columns"][0]["name"], "trial");
        assert_eq!(parsed["cells"].as_array().map(Vec::len), Some(1));
        assert!(parsed["generated_at"].is_string());
        assert_eq!(
            serde_json::to_value(Value::Int(7)).unwrap(),
            parsed["cells"][0]["values"][0]["value"]
        );
    }

    #[test]
    fn snapshot_is_stable_across_calls() {
        let mut db = Database::new();
        db.add_column(Column::reference(db.id(), "notes").unwrap()).unwrap();
        assert_eq!(snapshot(&db).unwrap(), snapshot(&db).unwrap());
    }
}
