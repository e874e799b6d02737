//! # Annotation Data Model
//!
//! Entities that live in a database: vocabulary elements and their formal
//! arguments, columns, cells and the data values inside cells.
//!
//! Design rule: this module is data plus local validation. Cross-entity
//! consistency (name tables, cascades, notifications) belongs to `storage`.

pub mod id;
pub mod names;
pub mod time_stamp;
pub mod element;
pub mod formal_arg;
pub mod value;
pub mod vocab;
pub mod column;
pub mod cell;

pub use id::{DatabaseId, EntityId, INVALID_ID};
pub use time_stamp::TimeStamp;
pub use element::{Element, ElementKind, Entity, InternalRole};
pub use formal_arg::{Bounds, FargChange, FargKind, FargType, FormalArg};
pub use value::{Constraint, DataValue, Value};
pub use vocab::{FargListDiff, MatrixType, VocabChanges, VocabElement, VocabKind};
pub use column::{Column, ColumnChanges, ColumnKind};
pub use cell::{CellChanges, DataCell};
