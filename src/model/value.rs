//! Data values and their argument-derived constraints.
//!
//! A `DataValue` fills one formal-argument slot of a cell. Its subrange
//! knowledge is a cached copy of the governing argument's constraint and is
//! only ever refreshed from that argument.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::formal_arg::{Bounds, FargType, FormalArg};
use super::id::{EntityId, INVALID_ID};
use super::names::{is_valid_farg_name, is_valid_nominal, is_valid_quote_string, is_valid_text_string};
use super::time_stamp::TimeStamp;
use crate::{Error, Result};

// ============================================================================
// Value
// ============================================================================

/// Raw content of a data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Int(i64),
    Float(f64),
    Nominal(Option<String>),
    QuoteString(Option<String>),
    Text(Option<String>),
    TimeStamp(TimeStamp),
    /// Placeholder for an untyped argument that has no value yet. Carries
    /// the argument name.
    Undefined(String),
}

impl Value {
    pub fn nominal(s: impl Into<String>) -> Self {
        Value::Nominal(Some(s.into()))
    }

    pub fn quote_string(s: impl Into<String>) -> Self {
        Value::QuoteString(Some(s.into()))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(Some(s.into()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Nominal(_) => "Nominal",
            Value::QuoteString(_) => "QuoteString",
            Value::Text(_) => "Text",
            Value::TimeStamp(_) => "TimeStamp",
            Value::Undefined(_) => "Undefined",
        }
    }

    /// True for the empty string kinds and for `Undefined`.
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            Value::Nominal(None) | Value::QuoteString(None) | Value::Text(None) | Value::Undefined(_)
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Nominal(s) | Value::QuoteString(s) | Value::Text(s) => s.as_deref(),
            _ => None,
        }
    }

    /// Character-class check of string contents. Numeric kinds always pass.
    pub fn content_is_valid(&self) -> bool {
        match self {
            Value::Nominal(s) => s.as_deref().is_none_or(is_valid_nominal),
            Value::QuoteString(s) => s.as_deref().is_none_or(is_valid_quote_string),
            Value::Text(s) => s.as_deref().is_none_or(is_valid_text_string),
            Value::Undefined(name) => is_valid_farg_name(name),
            Value::Int(_) | Value::Float(_) | Value::TimeStamp(_) => true,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<TimeStamp> for Value {
    fn from(v: TimeStamp) -> Self {
        Value::TimeStamp(v)
    }
}

// ============================================================================
// Constraint
// ============================================================================

/// The subrange a value inherits from its argument.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Constraint {
    #[default]
    None,
    Int(Bounds<i64>),
    Float(Bounds<f64>),
    Time(Bounds<TimeStamp>),
    Approved(BTreeSet<String>),
}

impl Constraint {
    pub fn is_active(&self) -> bool {
        !matches!(self, Constraint::None)
    }

    /// Clamp to the nearest bound; nominals outside the approved set
    /// become empty.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Constraint::Int(b), Value::Int(v)) => Value::Int(v.clamp(b.min, b.max)),
            (Constraint::Float(b), Value::Float(v)) => Value::Float(v.clamp(b.min, b.max)),
            (Constraint::Time(b), Value::TimeStamp(t)) => Value::TimeStamp(t.clamp(b.min, b.max)),
            (Constraint::Approved(approved), Value::Nominal(Some(s))) if !approved.contains(&s) => {
                Value::Nominal(None)
            }
            (_, v) => v,
        }
    }
}

// ============================================================================
// DataValue
// ============================================================================

/// One slot of a cell, bound to a formal argument.
///
/// Values built with [`DataValue::new`] are unbound until a cell carrying
/// them is appended to or replaced in a column, at which point they are
/// bound positionally to the column's argument list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataValue {
    farg_id: EntityId,
    farg_type: Option<FargType>,
    cell_id: EntityId,
    #[serde(skip)]
    constraint: Constraint,
    value: Value,
}

impl DataValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            farg_id: INVALID_ID,
            farg_type: None,
            cell_id: INVALID_ID,
            constraint: Constraint::None,
            value: value.into(),
        }
    }

    /// Bind `value` to `farg`, adopting its constraint and coercing.
    pub(crate) fn bound(farg: &FormalArg, value: Value) -> Self {
        let constraint = farg.kind().constraint();
        let value = constraint.coerce(value);
        Self {
            farg_id: farg.id(),
            farg_type: Some(farg.farg_type()),
            cell_id: INVALID_ID,
            constraint,
            value,
        }
    }

    pub fn farg_id(&self) -> EntityId {
        self.farg_id
    }

    pub fn farg_type(&self) -> Option<FargType> {
        self.farg_type
    }

    pub fn cell_id(&self) -> EntityId {
        self.cell_id
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn subrange(&self) -> bool {
        self.constraint.is_active()
    }

    pub fn is_bound(&self) -> bool {
        self.farg_id.is_valid()
    }

    /// Store a new value, clamped into the inherited subrange.
    ///
    /// A bound value only accepts content its argument type accepts.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(farg_type) = self.farg_type
            && !farg_type.accepts(&value)
        {
            return Err(Error::TypeMismatch {
                expected: farg_type.to_string(),
                got: value.type_name().to_string(),
            });
        }
        if !value.content_is_valid() {
            return Err(Error::InvalidArgument(format!("invalid {} content", value.type_name())));
        }
        self.value = self.constraint.coerce(value);
        Ok(())
    }

    /// What `value` would become if stored here.
    pub fn coerce_to_range(&self, value: Value) -> Value {
        self.constraint.coerce(value)
    }

    /// React to an edit of the governing argument.
    ///
    /// Only reachable from the vocabulary replace protocol, so every check
    /// failing here is a defect.
    pub fn update_for_farg_change(
        &mut self,
        name_changed: bool,
        subrange_changed: bool,
        range_changed: bool,
        old: &FormalArg,
        new: &FormalArg,
    ) -> Result<()> {
        if old.id() != new.id() {
            return Err(Error::InvariantViolation(format!(
                "argument id changed from {} to {}",
                old.id(),
                new.id()
            )));
        }
        if old.ve_id() != new.ve_id() {
            return Err(Error::InvariantViolation(format!(
                "argument {} moved between vocab elements",
                new.id()
            )));
        }
        if old.farg_type() != new.farg_type() {
            return Err(Error::InvariantViolation(format!(
                "argument {} changed type from {} to {}",
                new.id(),
                old.farg_type(),
                new.farg_type()
            )));
        }
        if self.farg_id != new.id() || self.farg_type != Some(new.farg_type()) {
            return Err(Error::InvariantViolation(format!(
                "value bound to argument {} updated for argument {}",
                self.farg_id,
                new.id()
            )));
        }

        if subrange_changed || range_changed {
            self.update_subrange(new);
        }
        if name_changed && let Value::Undefined(name) = &mut self.value {
            *name = new.name().to_string();
        }
        Ok(())
    }

    pub(crate) fn update_subrange(&mut self, farg: &FormalArg) {
        self.constraint = farg.kind().constraint();
        let current = std::mem::replace(&mut self.value, Value::Int(0));
        self.value = self.constraint.coerce(current);
    }

    pub(crate) fn set_cell_id(&mut self, cell_id: EntityId) {
        self.cell_id = cell_id;
    }
}
