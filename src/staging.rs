// 📦 Staging Area - the in-memory batch window
//
// One arena per entity kind plus a natural-key → slot index. Children point at
// their parent's slot with `ParentRef::Staged(slot)` until the batch is
// written. Entities that already have an id are indexed by id too, so a stored
// record is staged at most once per window.

use crate::entities::{Address, Endpoint, Entity, GisRecord, Meter, ParentRef};
use std::collections::HashMap;

// ============================================================================
// STAGED ENTITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Built from the CSV; needs an insert.
    New,
    /// Loaded from the store and refreshed from the CSV; needs an update.
    Update,
}

#[derive(Debug, Clone)]
pub struct Staged<E> {
    pub entity: E,
    pub stage: Stage,
}

// ============================================================================
// ARENA
// ============================================================================

#[derive(Debug, Clone)]
pub struct Arena<E: Entity> {
    items: Vec<Staged<E>>,
    by_key: HashMap<E::Key, usize>,
    by_id: HashMap<i64, usize>,
}

impl<E: Entity> Default for Arena<E> {
    fn default() -> Self {
        Arena {
            items: Vec::new(),
            by_key: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<E: Entity> Arena<E> {
    /// First slot matching any of `keys`, probed in order.
    pub fn find(&self, keys: &[E::Key]) -> Option<usize> {
        keys.iter().find_map(|key| self.by_key.get(key).copied())
    }

    pub fn find_id(&self, id: i64) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Stage an entity and index it under all of its natural keys. Keys that
    /// already point at another slot keep their first owner.
    pub fn push(&mut self, entity: E, stage: Stage) -> usize {
        let slot = self.items.len();
        for key in entity.natural_keys() {
            self.by_key.entry(key).or_insert(slot);
        }
        if let Some(id) = entity.id() {
            self.by_id.entry(id).or_insert(slot);
        }
        self.items.push(Staged { entity, stage });
        slot
    }

    /// Record the id a write gave the entity in `slot`.
    pub fn assign_id(&mut self, slot: usize, id: i64) {
        if let Some(staged) = self.items.get_mut(slot) {
            staged.entity.set_id(id);
            self.by_id.entry(id).or_insert(slot);
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Staged<E>> {
        self.items.get(slot)
    }

    /// How a child should refer to the entity in `slot`.
    pub fn reference(&self, slot: usize) -> ParentRef {
        match self.items.get(slot).and_then(|s| s.entity.id()) {
            Some(id) => ParentRef::Stored(id),
            None => ParentRef::Staged(slot),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Staged<E>> {
        self.items.iter()
    }

    /// Drop every slot at or after `len` together with its index entries.
    fn truncate(&mut self, len: usize) {
        if len >= self.items.len() {
            return;
        }
        self.items.truncate(len);
        self.by_key.retain(|_, slot| *slot < len);
        self.by_id.retain(|_, slot| *slot < len);
    }
}

// ============================================================================
// STAGING AREA
// ============================================================================

/// Slot counts at a point in time; restoring one undoes everything staged
/// after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    addresses: usize,
    meters: usize,
    endpoints: usize,
    gis_records: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    pub addresses: Arena<Address>,
    pub meters: Arena<Meter>,
    pub endpoints: Arena<Endpoint>,
    pub gis_records: Arena<GisRecord>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            addresses: self.addresses.len(),
            meters: self.meters.len(),
            endpoints: self.endpoints.len(),
            gis_records: self.gis_records.len(),
        }
    }

    pub fn rollback_to(&mut self, checkpoint: Checkpoint) {
        self.addresses.truncate(checkpoint.addresses);
        self.meters.truncate(checkpoint.meters);
        self.endpoints.truncate(checkpoint.endpoints);
        self.gis_records.truncate(checkpoint.gis_records);
    }

    pub fn len(&self) -> usize {
        self.addresses.len() + self.meters.len() + self.endpoints.len() + self.gis_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the window over and start an empty one.
    pub fn take(&mut self) -> StagingArea {
        std::mem::take(self)
    }
}
