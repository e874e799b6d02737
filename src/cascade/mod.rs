//! Cascade controller.
//!
//! A reference-counted boundary marker. Nested begin/end pairs coalesce
//! into one observable cascade: listeners hear "begin" only on the 0 → 1
//! transition and "end" only on the 1 → 0 transition.
//!
//! The controller only counts. Dispatching to listeners needs the whole
//! database (internal listeners are resolved through the identity
//! registry), so `Database` does it based on the returned [`Boundary`].

use crate::listeners::{CascadeListener, ListenerSet};
use crate::model::InternalRole;
use crate::{Error, Result};

/// What a begin/end call did to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// 0 → 1: notify begin.
    Opened,
    /// 1 → 0: notify end.
    Closed,
    /// Anything else: stay silent.
    Nested,
}

pub struct CascadeController {
    depth: i64,
    listeners: ListenerSet<dyn CascadeListener>,
}

impl CascadeController {
    pub fn new() -> Self {
        Self {
            depth: 0,
            listeners: ListenerSet::new(InternalRole::Cascade),
        }
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn enter(&mut self) -> Result<Boundary> {
        if self.depth < 0 {
            return Err(Error::NegativeCounter(self.depth));
        }
        self.depth += 1;
        Ok(if self.depth == 1 { Boundary::Opened } else { Boundary::Nested })
    }

    pub fn exit(&mut self) -> Result<Boundary> {
        if self.depth < 0 {
            return Err(Error::NegativeCounter(self.depth));
        }
        if self.depth == 0 {
            return Err(Error::PrematureEnd);
        }
        self.depth -= 1;
        Ok(if self.depth == 0 { Boundary::Closed } else { Boundary::Nested })
    }

    pub fn listeners(&self) -> &ListenerSet<dyn CascadeListener> {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerSet<dyn CascadeListener> {
        &mut self.listeners
    }
}

impl Default for CascadeController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CascadeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeController")
            .field("depth", &self.depth)
            .field("listeners", &self.listeners)
            .finish()
    }
}
