//! End-to-end tests for the column and vocabulary registries.
//!
//! Each test drives a fresh `Database` through its public API and checks
//! both name tables against the identity registry afterwards.

use std::sync::Arc;

use annotation_db::export::snapshot;
use annotation_db::{
    CascadeListener, Column, ColumnChanges, ColumnListener, Database, EntityId, Error, FargKind, FormalArg,
    MatrixType, VocabChanges, VocabElement, VocabElementListener,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn assert_bijection(db: &Database) {
    for id in db.columns().ids() {
        let column = db.columns().lookup_by_id(*id).unwrap();
        assert_eq!(db.columns().name_of(*id), Some(column.name()));
        assert_eq!(db.columns().lookup_by_name(column.name()).unwrap().id(), *id);
    }
    for id in db.vocab().ids() {
        let ve = db.vocab().lookup_by_id(*id).unwrap();
        assert_eq!(db.vocab().name_of(*id), Some(ve.name()));
        assert_eq!(db.vocab().lookup_by_name(ve.name()).unwrap().id(), *id);
    }
}

#[derive(Default)]
struct Watcher {
    log: Mutex<Vec<&'static str>>,
}

impl Watcher {
    fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl CascadeListener for Watcher {
    fn on_cascade_begin(&self, _db: &Database) {
        self.log.lock().push("begin");
    }

    fn on_cascade_end(&self, _db: &Database) {
        self.log.lock().push("end");
    }
}

impl ColumnListener for Watcher {
    fn on_column_changed(&self, _db: &Database, _col_id: EntityId, _changes: &ColumnChanges) {
        self.log.lock().push("column changed");
    }

    fn on_column_deleted(&self, _db: &Database, _col_id: EntityId) {
        self.log.lock().push("column deleted");
    }
}

impl VocabElementListener for Watcher {
    fn on_vocab_changed(&self, _db: &Database, _ve_id: EntityId, _changes: &VocabChanges) {
        self.log.lock().push("vocab changed");
    }

    fn on_vocab_deleted(&self, _db: &Database, _ve_id: EntityId) {
        self.log.lock().push("vocab deleted");
    }
}

fn predicate(db: &Database, name: &str) -> VocabElement {
    let mut ve = VocabElement::predicate(db.id(), name).unwrap();
    ve.append_farg(FormalArg::new(db.id(), "<agent>", FargKind::Untyped).unwrap()).unwrap();
    ve.append_farg(FormalArg::new(db.id(), "<patient>", FargKind::Untyped).unwrap()).unwrap();
    ve
}

// ============================================================================
// 1. Insert two columns, reject a duplicate, remove one
// ============================================================================

#[test]
fn test_insert_conflict_remove() {
    let mut db = Database::new();
    let float = db.add_column(Column::data(db.id(), "float", MatrixType::Float).unwrap()).unwrap();
    let int = db.add_column(Column::data(db.id(), "int", MatrixType::Integer).unwrap()).unwrap();

    let again = Column::data(db.id(), "float", MatrixType::Float).unwrap();
    assert!(matches!(db.add_column(again), Err(Error::NameConflict(_))));
    assert_eq!(db.columns().len(), 2);
    assert!(!db.is_poisoned());

    db.remove_column(float).unwrap();
    assert!(matches!(db.columns().lookup_by_name("float"), Err(Error::UnknownIdentifier(_))));
    assert!(matches!(db.vocab().lookup_by_name("float"), Err(Error::UnknownIdentifier(_))));

    let remaining = db.columns().lookup_by_id(int).unwrap();
    assert_eq!(remaining.name(), "int");
    assert_eq!(remaining.matrix_type(), Some(MatrixType::Integer));
    assert_bijection(&db);
}

// ============================================================================
// 2. A data column and its matrix vocab element point at each other
// ============================================================================

#[test]
fn test_data_column_is_bound_to_its_schema() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "gaze", MatrixType::Nominal).unwrap()).unwrap();

    let column = db.column(col).unwrap();
    let mve_id = column.mve_id().unwrap();
    let mve = db.vocab_element(mve_id).unwrap();

    assert_eq!(mve.name(), "gaze");
    assert_eq!(mve.col_id(), col);
    assert_eq!(mve.matrix_type(), Some(MatrixType::Nominal));
    assert_eq!(mve.num_fargs(), 1);
    assert_eq!(mve.fargs()[0].name(), FormalArg::DEFAULT_NAME);
    assert_eq!(db.index().farg(mve.fargs()[0].id()).unwrap().ve_id(), mve_id);
}

// ============================================================================
// 3. Column and vocab names share one namespace
// ============================================================================

#[test]
fn test_names_are_shared_between_registries() {
    let mut db = Database::new();
    db.add_column(Column::data(db.id(), "looks", MatrixType::Text).unwrap()).unwrap();

    let clash = predicate(&db, "looks");
    assert!(matches!(db.add_vocab_element(clash), Err(Error::NameConflict(_))));

    let pred = db.add_vocab_element(predicate(&db, "touches")).unwrap();
    let clash = Column::reference(db.id(), "touches").unwrap();
    assert!(matches!(db.add_column(clash), Err(Error::NameConflict(_))));

    db.remove_vocab_element(pred).unwrap();
    db.add_column(Column::reference(db.id(), "touches").unwrap()).unwrap();
    assert_bijection(&db);
}

// ============================================================================
// 4. Removing a column with cells fails and changes nothing
// ============================================================================

#[test]
fn test_remove_non_empty_column_is_rejected() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
    let cell = db.new_cell(col).unwrap().with_values([3i64]);
    db.append_cell(cell).unwrap();

    let before = snapshot(&db).unwrap();
    assert!(matches!(db.remove_column(col), Err(Error::NotEmpty(_))));
    assert!(matches!(db.columns_mut().remove(col), Err(Error::NotEmpty(_))));
    assert_eq!(snapshot(&db).unwrap(), before);
    assert!(!db.is_poisoned());
}

#[test]
fn test_rejected_removal_keeps_listeners() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
    let mve = db.column(col).unwrap().mve_id().unwrap();
    let cell_id = db.append_cell(db.new_cell(col).unwrap().with_values([3i64])).unwrap();

    let watcher = Arc::new(Watcher::default());
    db.add_cascade_listener(watcher.clone()).unwrap();
    db.add_column_listener(col, watcher.clone()).unwrap();
    db.add_vocab_element_listener(mve, watcher.clone()).unwrap();

    assert!(matches!(db.remove_column(col), Err(Error::NotEmpty(_))));
    assert!(matches!(db.remove_vocab_element(mve), Err(Error::NotEmpty(_))));
    assert!(watcher.take().is_empty());

    // The schema binding and the column's cascade hookup both survived.
    let mut element = db.vocab_element(mve).unwrap().clone();
    element.set_name("attempt").unwrap();
    db.replace_vocab_element(element).unwrap();
    assert_eq!(db.column(col).unwrap().name(), "attempt");
    assert_eq!(watcher.take(), vec!["begin", "column changed", "vocab changed", "end"]);

    let mut edited = db.cell(cell_id).unwrap().clone();
    edited.set_value(0, 4i64).unwrap();
    db.replace_cell(edited).unwrap();
    assert_eq!(watcher.take(), vec!["begin", "end"]);
    assert!(!db.is_poisoned());
    assert_bijection(&db);
}

// ============================================================================
// 5. A matrix vocab element cannot be removed while it governs a column
// ============================================================================

#[test]
fn test_governing_vocab_element_is_pinned() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
    let mve = db.column(col).unwrap().mve_id().unwrap();

    assert!(matches!(db.remove_vocab_element(mve), Err(Error::NotEmpty(_))));

    db.columns_mut().remove(col).unwrap();
    assert!(db.vocab().contains_id(mve));
    assert_eq!(db.vocab_element(mve).unwrap().col_id(), annotation_db::INVALID_ID);
    db.vocab_mut().remove(mve).unwrap();
    assert!(db.vocab().is_empty());
    assert!(db.index().is_empty());
}

// ============================================================================
// 6. Replace keeps the id and swaps the name, schema first
// ============================================================================

#[test]
fn test_replace_renames_column_and_schema() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();
    let mve = db.column(col).unwrap().mve_id().unwrap();

    let mut renamed = db.column(col).unwrap().clone();
    renamed.set_name("attempt").unwrap();
    renamed.set_hidden(true);
    db.replace_column(renamed).unwrap();

    let column = db.columns().lookup_by_id(col).unwrap();
    assert_eq!(column.name(), "attempt");
    assert!(column.hidden());
    assert_eq!(db.columns().lookup_by_name("attempt").unwrap().id(), col);
    assert!(db.columns().lookup_by_name("trial").is_err());
    assert_eq!(db.vocab().lookup_by_name("attempt").unwrap().id(), mve);
    assert!(db.vocab().lookup_by_name("trial").is_err());
    assert_bijection(&db);
}

#[test]
fn test_registry_replace_requires_schema_rename_first() {
    let mut db = Database::new();
    let col = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer).unwrap()).unwrap();

    let mut renamed = db.column(col).unwrap().clone();
    renamed.set_name("attempt").unwrap();
    assert!(matches!(db.columns_mut().replace(renamed), Err(Error::OutOfSync(_))));
    assert_eq!(db.column(col).unwrap().name(), "trial");
    assert!(!db.is_poisoned());
}

#[test]
fn test_replace_needs_a_registered_id() {
    let mut db = Database::new();
    let col = db.add_column(Column::reference(db.id(), "notes").unwrap()).unwrap();

    let unregistered = Column::reference(db.id(), "notes").unwrap();
    assert!(matches!(db.replace_column(unregistered), Err(Error::InvalidArgument(_))));

    let mut flagged = db.column(col).unwrap().clone();
    flagged.set_hidden(true);
    flagged.set_read_only(true);
    db.replace_column(flagged).unwrap();

    let column = db.column(col).unwrap();
    assert!(column.hidden());
    assert!(column.read_only());
    assert_eq!(db.columns().lookup_by_name("notes").unwrap().id(), col);
}

// ============================================================================
// 7. Entities from another database are rejected
// ============================================================================

#[test]
fn test_foreign_entities_are_rejected() {
    let mut db = Database::new();
    let other = Database::new();

    let foreign = Column::data(other.id(), "trial", MatrixType::Integer).unwrap();
    assert!(matches!(db.add_column(foreign), Err(Error::InvalidArgument(_))));
    assert!(matches!(db.add_vocab_element(predicate(&other, "p")), Err(Error::InvalidArgument(_))));
    assert!(db.index().is_empty());
}

// ============================================================================
// 8. Registry-level insert of a data column bound to an existing element
// ============================================================================

#[test]
fn test_registry_insert_checks_schema_binding() {
    let mut db = Database::new();
    let mut mve = VocabElement::matrix(db.id(), "speech", MatrixType::Text).unwrap();
    mve.append_farg(FormalArg::new(db.id(), "<val>", FargKind::Text).unwrap()).unwrap();
    let mve = db.vocab_mut().insert(mve).unwrap();

    let mut wrong_type = Column::data(db.id(), "speech", MatrixType::Nominal).unwrap();
    wrong_type.set_mve_id(mve).unwrap();
    assert!(matches!(db.columns_mut().insert(wrong_type), Err(Error::InvalidArgument(_))));

    let mut wrong_name = Column::data(db.id(), "talk", MatrixType::Text).unwrap();
    wrong_name.set_mve_id(mve).unwrap();
    assert!(matches!(db.columns_mut().insert(wrong_name), Err(Error::InvalidArgument(_))));

    let mut column = Column::data(db.id(), "speech", MatrixType::Text).unwrap();
    column.set_mve_id(mve).unwrap();
    let col = db.columns_mut().insert(column).unwrap();
    assert_eq!(db.vocab_element(mve).unwrap().col_id(), col);
    assert_bijection(&db);
}

// ============================================================================
// 9. Bijection holds after every operation of a random workload
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(usize, bool),
    Remove(usize),
    Rename(usize, usize),
}

const NAMES: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len(), any::<bool>()).prop_map(|(n, data)| Op::Add(n, data)),
        (0..NAMES.len()).prop_map(Op::Remove),
        (0..NAMES.len(), 0..NAMES.len()).prop_map(|(from, to)| Op::Rename(from, to)),
    ]
}

proptest! {
    #[test]
    fn registry_bijection_after_every_operation(ops in prop::collection::vec(op(), 1..40)) {
        let mut db = Database::new();
        let mut live: Vec<&str> = Vec::new();

        for op in ops {
            match op {
                Op::Add(n, data) => {
                    let name = NAMES[n];
                    let column = if data {
                        Column::data(db.id(), name, MatrixType::Integer).unwrap()
                    } else {
                        Column::reference(db.id(), name).unwrap()
                    };
                    let outcome = db.add_column(column);
                    prop_assert_eq!(outcome.is_ok(), !live.contains(&name));
                    if outcome.is_ok() {
                        live.push(name);
                    }
                }
                Op::Remove(n) => {
                    let name = NAMES[n];
                    match db.columns().lookup_by_name(name).map(|c| c.id()) {
                        Ok(id) => {
                            db.remove_column(id).unwrap();
                            live.retain(|l| *l != name);
                        }
                        Err(e) => prop_assert!(matches!(e, Error::UnknownIdentifier(_))),
                    }
                }
                Op::Rename(from, to) => {
                    let Ok(column) = db.columns().lookup_by_name(NAMES[from]) else { continue };
                    let mut renamed = column.clone();
                    renamed.set_name(NAMES[to]).unwrap();
                    let outcome = db.replace_column(renamed);
                    let expected = from == to || !live.contains(&NAMES[to]);
                    prop_assert_eq!(outcome.is_ok(), expected);
                    if outcome.is_ok() {
                        live.retain(|l| *l != NAMES[from]);
                        live.push(NAMES[to]);
                    }
                }
            }

            prop_assert!(!db.is_poisoned());
            prop_assert_eq!(db.columns().len(), live.len());
            assert_bijection(&db);
            let data_columns = db.columns().iter().filter(|c| c.is_data()).count();
            prop_assert_eq!(db.vocab().len(), data_columns);
        }
    }
}
