use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod store;
pub mod types;

pub use store::EntityTable;
pub use types::{Entity, GeometryParams};

#[cfg(test)]
mod tests_store;

/// A universally unique identifier for a geometric entity.
/// We wrap Uuid for strong typing and to allow for potential future
/// extension (e.g. adding generation/version counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ID from a specific UUID (useful for restoration).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a deterministic ID based on a string seed.
    pub fn new_deterministic(seed: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
