// Entity Models - the four normalized records carried by one CSV row
//
// Each entity has:
// - a surrogate id assigned by the store (None until persisted)
// - an explicit parent reference instead of a navigation property
// - one or more natural keys used for deduplication during import

pub mod address;
pub mod endpoint;
pub mod gis_record;
pub mod meter;

pub use address::{Address, AddressKey};
pub use endpoint::{Endpoint, EndpointKey};
pub use gis_record::{GisKey, GisRecord};
pub use meter::{Meter, MeterKey};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

// ============================================================================
// ENTITY KIND
// ============================================================================

/// The four record kinds, in parent → child order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Address,
    Meter,
    Endpoint,
    GisRecord,
}

impl EntityKind {
    /// Parent → child order (insert order).
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Address,
        EntityKind::Meter,
        EntityKind::Endpoint,
        EntityKind::GisRecord,
    ];

    /// Child → parent order (truncate order).
    pub const CHILDREN_FIRST: [EntityKind; 4] = [
        EntityKind::GisRecord,
        EntityKind::Endpoint,
        EntityKind::Meter,
        EntityKind::Address,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Address => "addresses",
            EntityKind::Meter => "meters",
            EntityKind::Endpoint => "endpoints",
            EntityKind::GisRecord => "gis_records",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Address => "address",
            EntityKind::Meter => "meter",
            EntityKind::Endpoint => "endpoint",
            EntityKind::GisRecord => "GIS record",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PARENT REFERENCE
// ============================================================================

/// Link from a child to its parent.
///
/// `Stored` carries the parent's surrogate id. `Staged` points at the parent's
/// slot in the current batch window; it only becomes an id when that batch is
/// written. Anything with an id is always referenced as `Stored`, so natural
/// keys built from a reference compare equal no matter how the parent was
/// found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    Stored(i64),
    Staged(usize),
}

impl ParentRef {
    pub fn stored_id(&self) -> Option<i64> {
        match self {
            ParentRef::Stored(id) => Some(*id),
            ParentRef::Staged(_) => None,
        }
    }
}

// ============================================================================
// ENTITY TRAIT
// ============================================================================

/// Common surface the staging area and writer need from every record kind.
pub trait Entity: Clone + fmt::Debug {
    type Key: Clone + Eq + Hash + fmt::Debug;

    const KIND: EntityKind;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Keys this entity can be found under, most specific first.
    fn natural_keys(&self) -> Vec<Self::Key>;

    /// Short human label for log lines ("meter 1001").
    fn label(&self) -> String;
}
