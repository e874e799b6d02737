//! Formal arguments: typed, optionally range-constrained slots of a
//! vocabulary element.
//!
//! The argument kind is a closed enum, and every per-kind decision
//! (empty values, salvage, validity, subranges) is an exhaustive match here.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::element::{ElementKind, Entity};
use super::id::{DatabaseId, EntityId, INVALID_ID};
use super::names::{is_valid_farg_name, is_valid_nominal, is_valid_quote_string, is_valid_text_string};
use super::time_stamp::TimeStamp;
use super::value::{Constraint, DataValue, Value};
use crate::{Error, Result};

/// Type tag of a formal argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FargType {
    Integer,
    Float,
    Nominal,
    QuoteString,
    Text,
    TimeStamp,
    Untyped,
}

impl FargType {
    /// Whether a value of this shape may fill an argument of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FargType::Integer => matches!(value, Value::Int(_)),
            FargType::Float => matches!(value, Value::Float(_)),
            FargType::Nominal => matches!(value, Value::Nominal(_)),
            FargType::QuoteString => matches!(value, Value::QuoteString(_)),
            FargType::Text => matches!(value, Value::Text(_)),
            FargType::TimeStamp => matches!(value, Value::TimeStamp(_)),
            FargType::Untyped => !matches!(value, Value::Text(_)),
        }
    }
}

impl fmt::Display for FargType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FargType::Integer => "integer",
            FargType::Float => "float",
            FargType::Nominal => "nominal",
            FargType::QuoteString => "quote string",
            FargType::Text => "text",
            FargType::TimeStamp => "time stamp",
            FargType::Untyped => "untyped",
        };
        f.write_str(s)
    }
}

/// Inclusive `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd> Bounds<T> {
    pub fn contains(&self, v: &T) -> bool {
        &self.min <= v && v <= &self.max
    }
}

/// Argument kind with its kind-specific constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum FargKind {
    Integer { range: Option<Bounds<i64>> },
    Float { range: Option<Bounds<f64>> },
    Nominal { approved: Option<BTreeSet<String>> },
    QuoteString,
    Text,
    TimeStamp { range: Option<Bounds<TimeStamp>> },
    Untyped,
}

impl FargKind {
    pub fn farg_type(&self) -> FargType {
        match self {
            FargKind::Integer { .. } => FargType::Integer,
            FargKind::Float { .. } => FargType::Float,
            FargKind::Nominal { .. } => FargType::Nominal,
            FargKind::QuoteString => FargType::QuoteString,
            FargKind::Text => FargType::Text,
            FargKind::TimeStamp { .. } => FargType::TimeStamp,
            FargKind::Untyped => FargType::Untyped,
        }
    }

    /// Unconstrained kind for a type tag.
    pub fn unconstrained(farg_type: FargType) -> Self {
        match farg_type {
            FargType::Integer => FargKind::Integer { range: None },
            FargType::Float => FargKind::Float { range: None },
            FargType::Nominal => FargKind::Nominal { approved: None },
            FargType::QuoteString => FargKind::QuoteString,
            FargType::Text => FargKind::Text,
            FargType::TimeStamp => FargKind::TimeStamp { range: None },
            FargType::Untyped => FargKind::Untyped,
        }
    }

    pub fn subrange(&self) -> bool {
        match self {
            FargKind::Integer { range } => range.is_some(),
            FargKind::Float { range } => range.is_some(),
            FargKind::Nominal { approved } => approved.is_some(),
            FargKind::TimeStamp { range } => range.is_some(),
            FargKind::QuoteString | FargKind::Text | FargKind::Untyped => false,
        }
    }

    pub(crate) fn constraint(&self) -> Constraint {
        match self {
            FargKind::Integer { range: Some(b) } => Constraint::Int(*b),
            FargKind::Float { range: Some(b) } => Constraint::Float(*b),
            FargKind::Nominal { approved: Some(a) } => Constraint::Approved(a.clone()),
            FargKind::TimeStamp { range: Some(b) } => Constraint::Time(*b),
            _ => Constraint::None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            FargKind::Integer { range: Some(b) } if b.min >= b.max => Err(bad_range(b.min, b.max)),
            FargKind::Float { range: Some(b) } if !(b.min < b.max) => Err(bad_range(b.min, b.max)),
            FargKind::TimeStamp { range: Some(b) } if b.min >= b.max => Err(bad_range(b.min, b.max)),
            FargKind::Nominal { approved: Some(a) } => match a.iter().find(|s| !is_valid_nominal(s)) {
                Some(s) => Err(Error::InvalidArgument(format!("approved value {s:?} is not a nominal"))),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

fn bad_range<T: fmt::Display>(min: T, max: T) -> Error {
    Error::InvalidArgument(format!("range minimum {min} must be below maximum {max}"))
}

/// Per-argument change flags between two versions of a vocabulary element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FargChange {
    pub name_changed: bool,
    pub subrange_changed: bool,
    pub range_changed: bool,
    pub inserted: bool,
}

impl FargChange {
    pub fn any(&self) -> bool {
        self.name_changed || self.subrange_changed || self.range_changed || self.inserted
    }
}

// ============================================================================
// FormalArg
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormalArg {
    id: EntityId,
    db: DatabaseId,
    name: String,
    ve_id: EntityId,
    hidden: bool,
    kind: FargKind,
}

impl FormalArg {
    pub const DEFAULT_NAME: &'static str = "<val>";

    pub fn new(db: DatabaseId, name: impl Into<String>, kind: FargKind) -> Result<Self> {
        let name = name.into();
        if !is_valid_farg_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid argument name")));
        }
        kind.validate()?;
        Ok(Self {
            id: INVALID_ID,
            db,
            name,
            ve_id: INVALID_ID,
            hidden: false,
            kind,
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

    /// The vocabulary element this argument belongs to.
    pub fn ve_id(&self) -> EntityId {
        self.ve_id
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn kind(&self) -> &FargKind {
        &self.kind
    }

    pub fn farg_type(&self) -> FargType {
        self.kind.farg_type()
    }

    pub fn subrange(&self) -> bool {
        self.kind.subrange()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_valid_farg_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid argument name")));
        }
        self.name = name;
        Ok(())
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Restrict an integer argument. The full `i64` domain clears the subrange.
    pub fn set_int_range(&mut self, min: i64, max: i64) -> Result<()> {
        let farg_type = self.farg_type();
        let FargKind::Integer { range } = &mut self.kind else {
            return Err(type_mismatch(FargType::Integer, farg_type));
        };
        if min >= max {
            return Err(bad_range(min, max));
        }
        *range = (min != i64::MIN || max != i64::MAX).then_some(Bounds { min, max });
        Ok(())
    }

    pub fn set_float_range(&mut self, min: f64, max: f64) -> Result<()> {
        let farg_type = self.farg_type();
        let FargKind::Float { range } = &mut self.kind else {
            return Err(type_mismatch(FargType::Float, farg_type));
        };
        if !(min < max) {
            return Err(bad_range(min, max));
        }
        *range = (min != f64::MIN || max != f64::MAX).then_some(Bounds { min, max });
        Ok(())
    }

    pub fn set_time_range(&mut self, min: TimeStamp, max: TimeStamp) -> Result<()> {
        let farg_type = self.farg_type();
        let FargKind::TimeStamp { range } = &mut self.kind else {
            return Err(type_mismatch(FargType::TimeStamp, farg_type));
        };
        if min >= max {
            return Err(bad_range(min, max));
        }
        *range = Some(Bounds { min, max });
        Ok(())
    }

    /// Add a nominal to the approved set, turning the subrange on.
    pub fn approve(&mut self, nominal: &str) -> Result<()> {
        let farg_type = self.farg_type();
        let FargKind::Nominal { approved } = &mut self.kind else {
            return Err(type_mismatch(FargType::Nominal, farg_type));
        };
        if !is_valid_nominal(nominal) {
            return Err(Error::InvalidArgument(format!("{nominal:?} is not a nominal")));
        }
        approved.get_or_insert_with(BTreeSet::new).insert(nominal.to_string());
        Ok(())
    }

    pub fn revoke(&mut self, nominal: &str) -> Result<()> {
        let farg_type = self.farg_type();
        let FargKind::Nominal { approved } = &mut self.kind else {
            return Err(type_mismatch(FargType::Nominal, farg_type));
        };
        match approved.as_mut().map(|a| a.remove(nominal)) {
            Some(true) => Ok(()),
            _ => Err(Error::InvalidArgument(format!("{nominal:?} is not approved"))),
        }
    }

    /// Drop any range or approved set.
    pub fn clear_subrange(&mut self) {
        self.kind = FargKind::unconstrained(self.farg_type());
    }

    /// Is `value` acceptable as stored content for this argument?
    pub fn is_valid_value(&self, value: &Value) -> bool {
        if !value.content_is_valid() {
            return false;
        }
        match (&self.kind, value) {
            (FargKind::Integer { range }, Value::Int(v)) => range.is_none_or(|b| b.contains(v)),
            (FargKind::Float { range }, Value::Float(v)) => range.is_none_or(|b| b.contains(v)),
            (FargKind::Nominal { approved }, Value::Nominal(s)) => match (approved, s) {
                (Some(approved), Some(s)) => approved.contains(s),
                _ => true,
            },
            (FargKind::QuoteString, Value::QuoteString(_)) => true,
            (FargKind::Text, Value::Text(_)) => true,
            (FargKind::TimeStamp { range }, Value::TimeStamp(t)) => range.is_none_or(|b| b.contains(t)),
            (FargKind::Untyped, v) => self.farg_type().accepts(v),
            _ => false,
        }
    }

    /// The value a fresh cell gets for this argument.
    pub fn construct_empty_arg(&self) -> DataValue {
        let value = match &self.kind {
            FargKind::Integer { .. } => Value::Int(0),
            FargKind::Float { .. } => Value::Float(0.0),
            FargKind::Nominal { .. } => Value::Nominal(None),
            FargKind::QuoteString => Value::QuoteString(None),
            FargKind::Text => Value::Text(None),
            FargKind::TimeStamp { .. } => Value::TimeStamp(TimeStamp::default()),
            FargKind::Untyped => Value::Undefined(self.name.clone()),
        };
        DataValue::bound(self, value)
    }

    /// Best-effort conversion of a value that belonged to some other
    /// argument. Content that this argument cannot hold yields the empty
    /// value instead.
    pub fn construct_arg_with_salvage(&self, salvage: Option<&DataValue>) -> DataValue {
        let Some(salvage) = salvage.filter(|s| s.is_bound()) else {
            return self.construct_empty_arg();
        };
        let carried = match (&self.kind, salvage.value()) {
            (FargKind::Integer { .. }, Value::Int(v)) => Some(Value::Int(*v)),
            (FargKind::Integer { .. }, Value::Float(v)) => Some(Value::Int(*v as i64)),
            (FargKind::Float { .. }, Value::Float(v)) => Some(Value::Float(*v)),
            (FargKind::Float { .. }, Value::Int(v)) => Some(Value::Float(*v as f64)),
            (FargKind::Nominal { .. }, Value::Nominal(s)) => Some(Value::Nominal(s.clone())),
            (FargKind::Nominal { .. }, Value::QuoteString(Some(s)) | Value::Text(Some(s)))
                if is_valid_nominal(s) =>
            {
                Some(Value::nominal(s.as_str()))
            }
            (FargKind::QuoteString, Value::QuoteString(s) | Value::Nominal(s)) => {
                Some(Value::QuoteString(s.clone()))
            }
            (FargKind::QuoteString, Value::Text(Some(s))) if is_valid_quote_string(s) => {
                Some(Value::quote_string(s.as_str()))
            }
            (FargKind::Text, Value::Text(s)) => Some(Value::Text(s.clone())),
            (FargKind::Text, Value::QuoteString(Some(s)) | Value::Nominal(Some(s)))
                if is_valid_text_string(s) =>
            {
                Some(Value::text(s.as_str()))
            }
            (FargKind::TimeStamp { .. }, Value::TimeStamp(t)) => Some(Value::TimeStamp(*t)),
            (
                FargKind::Untyped,
                v @ (Value::Int(_)
                | Value::Float(_)
                | Value::Nominal(_)
                | Value::QuoteString(_)
                | Value::TimeStamp(_)),
            ) => Some(v.clone()),
            (FargKind::Untyped, Value::Text(Some(s))) if is_valid_quote_string(s) => {
                Some(Value::quote_string(s.as_str()))
            }
            _ => None,
        };
        match carried {
            Some(value) => DataValue::bound(self, value),
            None => self.construct_empty_arg(),
        }
    }

    /// Bind a caller-supplied value to this argument.
    pub(crate) fn bind(&self, value: &DataValue) -> Result<DataValue> {
        if value.is_bound() && value.farg_id() != self.id {
            return Err(Error::InvalidArgument(format!(
                "value bound to argument {} cannot fill argument {} ({})",
                value.farg_id(),
                self.id,
                self.name
            )));
        }
        let farg_type = self.farg_type();
        if !farg_type.accepts(value.value()) {
            return Err(Error::TypeMismatch {
                expected: farg_type.to_string(),
                got: value.value().type_name().to_string(),
            });
        }
        let content = match value.value() {
            Value::Undefined(_) => Value::Undefined(self.name.clone()),
            other if other.content_is_valid() => other.clone(),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "invalid {} content for argument {}",
                    other.type_name(),
                    self.name
                )));
            }
        };
        Ok(DataValue::bound(self, content))
    }

    /// Flags describing how `self` differs from its earlier version `old`.
    pub(crate) fn changes_from(&self, old: &FormalArg) -> Result<FargChange> {
        if self.id != old.id || self.ve_id != old.ve_id {
            return Err(Error::InvariantViolation(format!(
                "argument {} compared against unrelated argument {}",
                self.id, old.id
            )));
        }
        if self.farg_type() != old.farg_type() {
            return Err(Error::InvariantViolation(format!(
                "argument {} changed type from {} to {}",
                self.id,
                old.farg_type(),
                self.farg_type()
            )));
        }
        Ok(FargChange {
            name_changed: self.name != old.name,
            subrange_changed: self.subrange() != old.subrange(),
            range_changed: self.kind != old.kind,
            inserted: false,
        })
    }

    /// Same shape, ignoring identity.
    pub fn equivalent(&self, other: &FormalArg) -> bool {
        self.name == other.name && self.hidden == other.hidden && self.kind == other.kind
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub(crate) fn set_ve_id(&mut self, ve_id: EntityId) {
        self.ve_id = ve_id;
    }
}

fn type_mismatch(expected: FargType, got: FargType) -> Error {
    Error::TypeMismatch {
        expected: format!("{expected} argument"),
        got: format!("{got} argument"),
    }
}

impl Entity for FormalArg {
    fn id(&self) -> EntityId {
        self.id
    }

    fn db(&self) -> DatabaseId {
        self.db
    }

    fn kind(&self) -> ElementKind {
        ElementKind::FormalArg
    }

    fn entity_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DB: DatabaseId = DatabaseId(1);

    fn farg(kind: FargKind) -> FormalArg {
        let mut farg = FormalArg::new(DB, FormalArg::DEFAULT_NAME, kind).unwrap();
        farg.set_id(EntityId(10));
        farg
    }

    fn salvage(value: Value) -> DataValue {
        DataValue::bound(&farg(FargKind::Untyped), value)
    }

    #[test]
    fn rejects_bad_names_and_ranges() {
        assert!(FormalArg::new(DB, "val", FargKind::Text).is_err());
        let mut f = farg(FargKind::Integer { range: None });
        assert!(matches!(f.set_int_range(5, 5), Err(Error::InvalidArgument(_))));
        assert!(matches!(f.set_float_range(0.0, 1.0), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn full_domain_turns_subrange_off() {
        let mut f = farg(FargKind::Integer { range: None });
        f.set_int_range(-5, 5).unwrap();
        assert!(f.subrange());
        f.set_int_range(i64::MIN, i64::MAX).unwrap();
        assert!(!f.subrange());
    }

    #[test]
    fn empty_args_per_kind() {
        assert_eq!(farg(FargKind::Integer { range: None }).construct_empty_arg().value(), &Value::Int(0));
        assert_eq!(farg(FargKind::Text).construct_empty_arg().value(), &Value::Text(None));
        assert_eq!(
            farg(FargKind::Untyped).construct_empty_arg().value(),
            &Value::Undefined("<val>".into())
        );

        let mut ranged = farg(FargKind::Integer { range: None });
        ranged.set_int_range(5, 10).unwrap();
        assert_eq!(ranged.construct_empty_arg().value(), &Value::Int(5));
    }

    #[test]
    fn validity_follows_kind_and_range() {
        let mut f = farg(FargKind::Float { range: None });
        f.set_float_range(0.0, 1.0).unwrap();
        assert!(f.is_valid_value(&Value::Float(0.5)));
        assert!(!f.is_valid_value(&Value::Float(1.5)));
        assert!(!f.is_valid_value(&Value::Int(0)));

        let q = farg(FargKind::QuoteString);
        assert!(q.is_valid_value(&Value::quote_string("ok")));
        assert!(!q.is_valid_value(&Value::quote_string("no \"quotes\"")));

        let u = farg(FargKind::Untyped);
        assert!(u.is_valid_value(&Value::Int(3)));
        assert!(!u.is_valid_value(&Value::text("t")));
    }

    #[test]
    fn salvage_table() {
        let quote = farg(FargKind::QuoteString);
        assert_eq!(
            quote.construct_arg_with_salvage(Some(&salvage(Value::nominal("happy")))).value(),
            &Value::quote_string("happy")
        );
        assert_eq!(
            quote.construct_arg_with_salvage(Some(&salvage(Value::Int(4)))).value(),
            &Value::QuoteString(None)
        );

        let int = farg(FargKind::Integer { range: None });
        assert_eq!(int.construct_arg_with_salvage(Some(&salvage(Value::Float(2.9)))).value(), &Value::Int(2));

        let nominal = farg(FargKind::Nominal { approved: None });
        assert_eq!(
            nominal.construct_arg_with_salvage(Some(&salvage(Value::text("two words")))).value(),
            &Value::nominal("two words")
        );
        assert_eq!(
            nominal.construct_arg_with_salvage(Some(&salvage(Value::text("f(x)")))).value(),
            &Value::Nominal(None)
        );

        let untyped = farg(FargKind::Untyped);
        assert_eq!(
            untyped.construct_arg_with_salvage(Some(&salvage(Value::text("plain")))).value(),
            &Value::quote_string("plain")
        );
    }

    #[test]
    fn salvage_needs_a_bound_source() {
        let int = farg(FargKind::Integer { range: None });
        assert_eq!(int.construct_arg_with_salvage(None).value(), &Value::Int(0));
        let unbound = DataValue::new(7i64);
        assert_eq!(int.construct_arg_with_salvage(Some(&unbound)).value(), &Value::Int(0));
    }

    #[test]
    fn salvage_is_clamped() {
        let mut int = farg(FargKind::Integer { range: None });
        int.set_int_range(-1000, 1000).unwrap();
        assert_eq!(int.construct_arg_with_salvage(Some(&salvage(Value::Int(5000)))).value(), &Value::Int(1000));
    }

    #[test]
    fn changes_between_versions() {
        let mut old = farg(FargKind::Integer { range: None });
        old.set_ve_id(EntityId(3));
        let mut new = old.clone();
        new.set_name("<count>").unwrap();
        new.set_int_range(0, 9).unwrap();
        let change = new.changes_from(&old).unwrap();
        assert_eq!(
            change,
            FargChange { name_changed: true, subrange_changed: true, range_changed: true, inserted: false }
        );

        let mut retyped = farg(FargKind::Text);
        retyped.set_ve_id(EntityId(3));
        assert!(retyped.changes_from(&old).unwrap_err().is_defect());
    }
}
