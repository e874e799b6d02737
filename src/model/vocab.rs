//! Vocabulary elements: the schema that governs cells.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::element::{ElementKind, Entity};
use super::formal_arg::{FargChange, FargKind, FargType, FormalArg};
use super::id::{DatabaseId, EntityId, INVALID_ID};
use super::names::{is_valid_pred_name, is_valid_svar_name};
use crate::listeners::{ListenerSet, VocabElementListener};
use crate::{Error, Result};

/// Declared type of a matrix vocabulary element, and of the data column it
/// governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixType {
    Float,
    Integer,
    Nominal,
    Text,
    Matrix,
}

impl MatrixType {
    /// Kind of the single argument a new element of this type starts with.
    pub fn initial_farg_kind(self) -> FargKind {
        match self {
            MatrixType::Float => FargKind::Float { range: None },
            MatrixType::Integer => FargKind::Integer { range: None },
            MatrixType::Nominal => FargKind::Nominal { approved: None },
            MatrixType::Text => FargKind::Text,
            MatrixType::Matrix => FargKind::Untyped,
        }
    }

    /// Typed matrices hold exactly one argument of this type.
    pub fn single_farg_type(self) -> Option<FargType> {
        match self {
            MatrixType::Float => Some(FargType::Float),
            MatrixType::Integer => Some(FargType::Integer),
            MatrixType::Nominal => Some(FargType::Nominal),
            MatrixType::Text => Some(FargType::Text),
            MatrixType::Matrix => None,
        }
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatrixType::Float => "FLOAT",
            MatrixType::Integer => "INTEGER",
            MatrixType::Nominal => "NOMINAL",
            MatrixType::Text => "TEXT",
            MatrixType::Matrix => "MATRIX",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum VocabKind {
    /// Governs the data column `col_id` (invalid until the column exists).
    Matrix { matrix_type: MatrixType, col_id: EntityId },
    Predicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct VocabElement {
    id: EntityId,
    db: DatabaseId,
    name: String,
    kind: VocabKind,
    var_len: bool,
    fargs: Vec<FormalArg>,
    #[serde(skip)]
    listeners: Option<ListenerSet<dyn VocabElementListener>>,
}

impl VocabElement {
    /// A matrix element with no arguments yet.
    pub fn matrix(db: DatabaseId, name: impl Into<String>, matrix_type: MatrixType) -> Result<Self> {
        let name = name.into();
        if !is_valid_svar_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid matrix name")));
        }
        Ok(Self::bare(db, name, VocabKind::Matrix { matrix_type, col_id: INVALID_ID }))
    }

    pub fn predicate(db: DatabaseId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_valid_pred_name(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid predicate name")));
        }
        Ok(Self::bare(db, name, VocabKind::Predicate))
    }

    fn bare(db: DatabaseId, name: String, kind: VocabKind) -> Self {
        Self {
            id: INVALID_ID,
            db,
            name,
            kind,
            var_len: false,
            fargs: Vec::new(),
            listeners: None,
        }
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

    pub fn kind(&self) -> &VocabKind {
        &self.kind
    }

    pub fn var_len(&self) -> bool {
        self.var_len
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.kind, VocabKind::Matrix { .. })
    }

    pub fn matrix_type(&self) -> Option<MatrixType> {
        match self.kind {
            VocabKind::Matrix { matrix_type, .. } => Some(matrix_type),
            VocabKind::Predicate => None,
        }
    }

    /// The data column this element governs, or `INVALID_ID`.
    pub fn col_id(&self) -> EntityId {
        match self.kind {
            VocabKind::Matrix { col_id, .. } => col_id,
            VocabKind::Predicate => INVALID_ID,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !self.name_is_valid(&name) {
            return Err(Error::InvalidArgument(format!("{name:?} is not a valid name for {}", self.name)));
        }
        self.name = name;
        Ok(())
    }

    pub(crate) fn name_is_valid(&self, name: &str) -> bool {
        match self.kind {
            VocabKind::Matrix { .. } => is_valid_svar_name(name),
            VocabKind::Predicate => is_valid_pred_name(name),
        }
    }

    pub fn set_var_len(&mut self, var_len: bool) {
        self.var_len = var_len;
    }

    pub fn fargs(&self) -> &[FormalArg] {
        &self.fargs
    }

    pub fn num_fargs(&self) -> usize {
        self.fargs.len()
    }

    pub fn farg(&self, index: usize) -> Option<&FormalArg> {
        self.fargs.get(index)
    }

    /// Edit an argument of this (unregistered) copy in place.
    pub fn farg_mut(&mut self, index: usize) -> Option<&mut FormalArg> {
        self.fargs.get_mut(index)
    }

    pub fn farg_index(&self, farg_id: EntityId) -> Option<usize> {
        self.fargs.iter().position(|f| f.id() == farg_id)
    }

    pub fn append_farg(&mut self, farg: FormalArg) -> Result<()> {
        self.insert_farg(self.fargs.len(), farg)
    }

    pub fn insert_farg(&mut self, index: usize, farg: FormalArg) -> Result<()> {
        if index > self.fargs.len() {
            return Err(Error::InvalidArgument(format!("argument index {index} out of bounds")));
        }
        self.check_incoming(&farg, None)?;
        self.fargs.insert(index, farg);
        Ok(())
    }

    pub fn replace_farg(&mut self, index: usize, farg: FormalArg) -> Result<FormalArg> {
        if index >= self.fargs.len() {
            return Err(Error::InvalidArgument(format!("argument index {index} out of bounds")));
        }
        self.check_incoming(&farg, Some(index))?;
        Ok(std::mem::replace(&mut self.fargs[index], farg))
    }

    pub fn remove_farg(&mut self, index: usize) -> Result<FormalArg> {
        if index >= self.fargs.len() {
            return Err(Error::InvalidArgument(format!("argument index {index} out of bounds")));
        }
        Ok(self.fargs.remove(index))
    }

    fn check_incoming(&self, farg: &FormalArg, replacing: Option<usize>) -> Result<()> {
        if farg.db() != self.db {
            return Err(Error::InvalidArgument(format!(
                "argument {} belongs to another database",
                farg.name()
            )));
        }
        let clash = self
            .fargs
            .iter()
            .enumerate()
            .any(|(i, f)| Some(i) != replacing && f.name() == farg.name());
        if clash {
            return Err(Error::InvalidArgument(format!(
                "{} already has an argument named {}",
                self.name,
                farg.name()
            )));
        }
        Ok(())
    }

    /// Argument-list rules that hold for every registered element.
    pub(crate) fn validate_shape(&self) -> Result<()> {
        if self.fargs.is_empty() {
            return Err(Error::InvalidArgument(format!("{} has no arguments", self.name)));
        }
        if let Some(matrix_type) = self.matrix_type() {
            match matrix_type.single_farg_type() {
                Some(required) => {
                    if self.fargs.len() != 1 || self.fargs[0].farg_type() != required {
                        return Err(Error::InvalidArgument(format!(
                            "{matrix_type} matrix {} must have exactly one {required} argument",
                            self.name
                        )));
                    }
                }
                None => {
                    if self.fargs.iter().any(|f| f.farg_type() == FargType::Text) {
                        return Err(Error::InvalidArgument(format!(
                            "text arguments are only allowed in TEXT matrices ({})",
                            self.name
                        )));
                    }
                }
            }
        }
        for (i, farg) in self.fargs.iter().enumerate() {
            if farg.db() != self.db {
                return Err(Error::InvalidArgument(format!(
                    "argument {} belongs to another database",
                    farg.name()
                )));
            }
            if self.fargs[..i].iter().any(|f| f.name() == farg.name()) {
                return Err(Error::InvalidArgument(format!(
                    "{} has two arguments named {}",
                    self.name,
                    farg.name()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn set_col_id(&mut self, id: EntityId) {
        if let VocabKind::Matrix { col_id, .. } = &mut self.kind {
            *col_id = id;
        }
    }

    pub(crate) fn set_farg_id(&mut self, index: usize, id: EntityId) {
        if let Some(farg) = self.fargs.get_mut(index) {
            farg.set_id(id);
        }
    }

    /// Point every argument back at this element.
    pub(crate) fn propagate_id(&mut self) {
        let id = self.id;
        for farg in &mut self.fargs {
            farg.set_ve_id(id);
        }
    }

    pub(crate) fn listeners(&self) -> Option<&ListenerSet<dyn VocabElementListener>> {
        self.listeners.as_ref()
    }

    pub(crate) fn listeners_mut(&mut self) -> Option<&mut ListenerSet<dyn VocabElementListener>> {
        self.listeners.as_mut()
    }

    pub(crate) fn take_listeners(&mut self) -> Option<ListenerSet<dyn VocabElementListener>> {
        self.listeners.take()
    }

    pub(crate) fn set_listeners(&mut self, listeners: Option<ListenerSet<dyn VocabElementListener>>) {
        self.listeners = listeners;
    }
}

impl Entity for VocabElement {
    fn id(&self) -> EntityId {
        self.id
    }

    fn db(&self) -> DatabaseId {
        self.db
    }

    fn kind(&self) -> ElementKind {
        ElementKind::VocabElement
    }

    fn entity_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

// ============================================================================
// Change records
// ============================================================================

/// How the argument list moved between two versions of an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FargListDiff {
    pub old: Vec<FormalArg>,
    pub new: Vec<FormalArg>,
    /// For each new argument, the index of the old argument with its id.
    pub new_to_old: Vec<Option<usize>>,
    /// For each old argument, the index of the new argument with its id.
    pub old_to_new: Vec<Option<usize>>,
    /// One entry per new argument.
    pub changes: Vec<FargChange>,
}

impl FargListDiff {
    /// Old arguments that no longer exist.
    pub fn deleted(&self) -> impl Iterator<Item = usize> + '_ {
        self.old_to_new.iter().enumerate().filter(|(_, m)| m.is_none()).map(|(i, _)| i)
    }

    /// New arguments without an old counterpart.
    pub fn inserted(&self) -> impl Iterator<Item = usize> + '_ {
        self.changes.iter().enumerate().filter(|(_, c)| c.inserted).map(|(i, _)| i)
    }
}

/// Field-level diff of a vocabulary element replace. Only changed fields
/// are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabChanges {
    pub name: Option<(String, String)>,
    pub var_len: Option<(bool, bool)>,
    pub fargs: Option<FargListDiff>,
}

impl VocabChanges {
    /// `None` when nothing observable changed. Both versions must have
    /// registered arguments.
    pub(crate) fn between(old: &VocabElement, new: &VocabElement) -> Result<Option<Self>> {
        let name = (old.name != new.name).then(|| (old.name.clone(), new.name.clone()));
        let var_len = (old.var_len != new.var_len).then_some((old.var_len, new.var_len));

        let mut new_to_old = vec![None; new.fargs.len()];
        let mut old_to_new = vec![None; old.fargs.len()];
        let mut changes = Vec::with_capacity(new.fargs.len());
        for (i, farg) in new.fargs.iter().enumerate() {
            match old.farg_index(farg.id()) {
                Some(j) => {
                    new_to_old[i] = Some(j);
                    old_to_new[j] = Some(i);
                    changes.push(farg.changes_from(&old.fargs[j])?);
                }
                None => changes.push(FargChange { inserted: true, ..FargChange::default() }),
            }
        }

        let moved = old.fargs.len() != new.fargs.len()
            || new_to_old.iter().enumerate().any(|(i, m)| *m != Some(i));
        let fargs = (moved || changes.iter().any(FargChange::any)).then(|| FargListDiff {
            old: old.fargs.clone(),
            new: new.fargs.clone(),
            new_to_old,
            old_to_new,
            changes,
        });

        if name.is_none() && var_len.is_none() && fargs.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { name, var_len, fargs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DB: DatabaseId = DatabaseId(1);

    fn registered(mut ve: VocabElement, id: u64) -> VocabElement {
        ve.id = EntityId(id);
        for (i, farg) in ve.fargs.iter_mut().enumerate() {
            farg.set_id(EntityId(id + 1 + i as u64));
        }
        ve.propagate_id();
        ve
    }

    fn farg(name: &str, kind: FargKind) -> FormalArg {
        FormalArg::new(DB, name, kind).unwrap()
    }

    #[test]
    fn typed_matrix_needs_one_matching_argument() {
        let mut ve = VocabElement::matrix(DB, "rating", MatrixType::Integer).unwrap();
        assert!(ve.validate_shape().is_err());
        ve.append_farg(farg("<val>", FargKind::Float { range: None })).unwrap();
        assert!(ve.validate_shape().is_err());
        ve.replace_farg(0, farg("<val>", FargKind::Integer { range: None })).unwrap();
        ve.validate_shape().unwrap();
    }

    #[test]
    fn argument_names_are_unique() {
        let mut ve = VocabElement::predicate(DB, "gives").unwrap();
        ve.append_farg(farg("<who>", FargKind::Nominal { approved: None })).unwrap();
        assert!(ve.append_farg(farg("<who>", FargKind::Untyped)).is_err());
    }

    #[test]
    fn names_follow_kind() {
        assert!(VocabElement::matrix(DB, "two words", MatrixType::Matrix).is_ok());
        assert!(VocabElement::predicate(DB, "two words").is_err());
    }

    #[test]
    fn diff_reports_only_what_changed() {
        let mut ve = VocabElement::predicate(DB, "looks").unwrap();
        ve.append_farg(farg("<who>", FargKind::Nominal { approved: None })).unwrap();
        ve.append_farg(farg("<at>", FargKind::Untyped)).unwrap();
        let old = registered(ve, 10);

        assert_eq!(VocabChanges::between(&old, &old.clone()).unwrap(), None);

        let mut new = old.clone();
        new.set_var_len(true);
        new.remove_farg(1).unwrap();
        let mut added = farg("<where>", FargKind::QuoteString);
        added.set_ve_id(EntityId(10));
        added.set_id(EntityId(20));
        new.append_farg(added).unwrap();

        let changes = VocabChanges::between(&old, &new).unwrap().unwrap();
        assert_eq!(changes.name, None);
        assert_eq!(changes.var_len, Some((false, true)));
        let fargs = changes.fargs.unwrap();
        assert_eq!(fargs.new_to_old, vec![Some(0), None]);
        assert_eq!(fargs.old_to_new, vec![Some(0), None]);
        assert_eq!(fargs.deleted().collect::<Vec<_>>(), vec![1]);
        assert_eq!(fargs.inserted().collect::<Vec<_>>(), vec![1]);
    }
}
