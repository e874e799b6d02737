//! Thread-shareable database handle.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Database;
use crate::Result;
use crate::config::DatabaseConfig;

/// Cloneable handle over one [`Database`]. Readers share the lock, every
/// mutation (including its whole cascade) runs under the write lock, so
/// observers never see a half-applied edit.
///
/// Listener callbacks run while the write lock is held. They receive the
/// database directly and must not go back through the handle.
#[derive(Clone, Default)]
pub struct SharedDatabase {
    inner: Arc<RwLock<Database>>,
}

impl SharedDatabase {
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        Ok(Self::from(Database::with_config(config)?))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Database> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Database> {
        self.inner.write()
    }

    /// Run `f` against the database under the write lock.
    pub fn with<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        f(&mut self.inner.write())
    }
}

impl From<Database> for SharedDatabase {
    fn from(db: Database) -> Self {
        Self { inner: Arc::new(RwLock::new(db)) }
    }
}

impl std::fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Some(db) => f.debug_tuple("SharedDatabase").field(&*db).finish(),
            None => f.write_str("SharedDatabase(<locked>)"),
        }
    }
}
