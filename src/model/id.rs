//! Database-scoped identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Stable identifier of a registered entity.
///
/// Assigned exactly once by the identity registry. `INVALID_ID` marks an
/// entity that has not been registered yet, or a reference with no referent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// The "not yet registered" id.
pub const INVALID_ID: EntityId = EntityId(0);

impl EntityId {
    pub fn is_valid(self) -> bool {
        self != INVALID_ID
    }
}

impl Default for EntityId {
    fn default() -> Self {
        INVALID_ID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one `Database` instance.
///
/// Every entity records the database it was built for, so a column built
/// against one database cannot be inserted into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseId(pub u64);

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

impl DatabaseId {
    pub(crate) fn allocate() -> Self {
        DatabaseId(NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_is_default() {
        assert_eq!(EntityId::default(), INVALID_ID);
        assert!(!INVALID_ID.is_valid());
        assert!(EntityId(7).is_valid());
    }

    #[test]
    fn database_ids_are_distinct() {
        let a = DatabaseId::allocate();
        let b = DatabaseId::allocate();
        assert_ne!(a, b);
    }
}
