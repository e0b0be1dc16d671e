use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{Entity, EntityId};

/// Per-workspace entity table.
///
/// A branch workspace holds only its local additions and copy-on-write
/// versions of inherited entities; lookups fall back to the base lineage at
/// the model layer. Tombstones shadow inherited entities that were deleted
/// locally, so a delete in a branch never touches the base table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTable {
    entities: HashMap<EntityId, Entity>,
    tombstones: HashSet<EntityId>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the local version of an entity. Clears any
    /// tombstone for the same id (a re-created entity is alive again).
    pub fn insert(&mut self, entity: Entity) {
        self.tombstones.remove(&entity.id);
        self.entities.insert(entity.id, entity);
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Remove an entity locally and leave a tombstone behind. The tombstone
    /// matters even when the entity only exists in the base lineage.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.tombstones.insert(*id);
        self.entities.remove(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn is_tombstoned(&self, id: &EntityId) -> bool {
        self.tombstones.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn tombstones(&self) -> impl Iterator<Item = &EntityId> {
        self.tombstones.iter()
    }
}
