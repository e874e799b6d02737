//! # annotation-db: In-Memory Time-Coded Annotation Database
//!
//! A spreadsheet-shaped store for behavioral coding: named columns of
//! time-coded cells, whose shape is governed by a vocabulary of matrix and
//! predicate elements with typed formal arguments.
//!
//! ## Design Principles
//!
//! 1. **Identity first**: every entity gets a stable `EntityId` from the
//!    database's identity registry; names are a second index on top.
//! 2. **Copy-on-write edits**: callers clone an entity, edit the copy and
//!    hand it back; the registry swaps it in and diffs old against new.
//! 3. **Schema first**: renaming a data column renames its vocabulary
//!    element, and argument edits flow down into every cell.
//! 4. **Coalesced notification**: nested edits share one cascade, and
//!    observers see one begin, one change per entity, one end.
//!
//! ## Quick Start
//!
//! ```rust
//! use annotation_db::{Column, Database, MatrixType, Value};
//!
//! # fn example() -> annotation_db::Result<()> {
//! let mut db = Database::new();
//! let trial = db.add_column(Column::data(db.id(), "trial", MatrixType::Integer)?)?;
//!
//! let cell = db.new_cell(trial)?.with_values([12i64]);
//! let cell_id = db.append_cell(cell)?;
//! assert_eq!(db.cell(cell_id)?.value(0).map(|v| v.value()), Some(&Value::Int(12)));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod index;
pub mod listeners;
pub mod cascade;
pub mod storage;
pub mod config;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    CellChanges, Column, ColumnChanges, ColumnKind, DataCell, DataValue, DatabaseId, Element, ElementKind,
    Entity, EntityId, FargKind, FargType, FormalArg, INVALID_ID, InternalRole, MatrixType, TimeStamp, Value,
    VocabChanges, VocabElement, VocabKind,
};

// ============================================================================
// Re-exports: Database
// ============================================================================

pub use config::DatabaseConfig;
pub use index::IdentityRegistry;
pub use listeners::{
    CascadeListener, CellListener, ColumnListListener, ColumnListener, ListenerSet, VocabElementListener,
    VocabListListener,
};
pub use storage::{ColumnList, Database, SharedDatabase, VocabList};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Name conflict: {0}")]
    NameConflict(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Not empty: {0}")]
    NotEmpty(String),

    #[error("Cascade ended without a matching begin")]
    PrematureEnd,

    #[error("Cascade counter went negative ({0})")]
    NegativeCounter(i64),

    #[error("Invalid listener: {0}")]
    InvalidListener(String),

    #[error("Entity {id} cannot act as internal {role} listener")]
    NotAnInternalListener { id: EntityId, role: InternalRole },

    #[error("Out of sync: {0}")]
    OutOfSync(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that only a bug can produce: the database's internal
    /// bookkeeping disagrees with itself.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::NegativeCounter(_) | Error::NotAnInternalListener { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
