// 🗄️ Record Store - the persistence seam of the import pipeline
//
// The pipeline only talks to storage through `RecordStore`. `SqliteStore`
// (db.rs) is the production implementation; tests wrap it to inject faults.

use crate::entities::{Address, Endpoint, Entity, EntityKind, GisRecord, Meter, ParentRef};
use crate::error::{StoreError, StoreResult};

// ============================================================================
// RECORD STORE
// ============================================================================

/// Blocking access to the four record tables.
///
/// Transactions are explicit: `begin` opens one, `commit`/`rollback` close it.
/// Outside a transaction every write commits on its own. `rollback` without an
/// open transaction is a no-op.
pub trait RecordStore {
    fn begin(&mut self) -> StoreResult<()>;
    fn commit(&mut self) -> StoreResult<()>;
    fn rollback(&mut self) -> StoreResult<()>;

    /// Defer referential checks until the current transaction commits.
    fn suspend_integrity(&mut self) -> StoreResult<()>;
    fn restore_integrity(&mut self) -> StoreResult<()>;

    /// Remove every row of one table and restart its id sequence.
    fn clear_table(&mut self, kind: EntityKind) -> StoreResult<()>;

    // Natural-key lookups

    fn address_by_icn(&mut self, icn: i32) -> StoreResult<Option<Address>>;
    fn address_by_location(
        &mut self,
        street: &str,
        city: Option<&str>,
        zip: Option<&str>,
    ) -> StoreResult<Option<Address>>;
    fn meter_by_serial(&mut self, serial: i32, address_id: i64) -> StoreResult<Option<Meter>>;
    fn endpoint_by_serial(&mut self, serial: i32, meter_id: i64) -> StoreResult<Option<Endpoint>>;
    fn gis_by_object_id(&mut self, object_id: i32) -> StoreResult<Option<GisRecord>>;
    fn gis_by_endpoint(&mut self, endpoint_id: i64) -> StoreResult<Option<GisRecord>>;

    // Writes. Inserts take the parent id explicitly and return the new id.

    fn insert_address(&mut self, address: &Address) -> StoreResult<i64>;
    fn insert_meter(&mut self, meter: &Meter, address_id: i64) -> StoreResult<i64>;
    fn insert_endpoint(&mut self, endpoint: &Endpoint, meter_id: i64) -> StoreResult<i64>;
    fn insert_gis_record(&mut self, record: &GisRecord, endpoint_id: i64) -> StoreResult<i64>;

    fn update_address(&mut self, address: &Address) -> StoreResult<()>;
    fn update_meter(&mut self, meter: &Meter) -> StoreResult<()>;
    fn update_endpoint(&mut self, endpoint: &Endpoint) -> StoreResult<()>;
    fn update_gis_record(&mut self, record: &GisRecord) -> StoreResult<()>;

    fn count(&mut self, kind: EntityKind) -> StoreResult<i64>;
}

/// Row counts for all four tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub addresses: i64,
    pub meters: i64,
    pub endpoints: i64,
    pub gis_records: i64,
}

pub fn table_counts(store: &mut dyn RecordStore) -> StoreResult<TableCounts> {
    Ok(TableCounts {
        addresses: store.count(EntityKind::Address)?,
        meters: store.count(EntityKind::Meter)?,
        endpoints: store.count(EntityKind::Endpoint)?,
        gis_records: store.count(EntityKind::GisRecord)?,
    })
}

// ============================================================================
// PERSISTABLE ENTITIES
// ============================================================================

/// Per-kind dispatch onto `RecordStore`, so the writer can treat the four
/// kinds uniformly.
pub trait Persist: Entity {
    /// The parent this entity hangs off; `None` for addresses.
    fn parent(&self) -> Option<ParentRef>;

    /// Look the entity up again by its natural key. `parent_id` is the
    /// resolved id of its parent, `None` when the parent has none yet.
    fn find_stored(
        &self,
        store: &mut dyn RecordStore,
        parent_id: Option<i64>,
    ) -> StoreResult<Option<Self>>;

    fn insert(&self, store: &mut dyn RecordStore, parent_id: Option<i64>) -> StoreResult<i64>;

    fn update(&self, store: &mut dyn RecordStore) -> StoreResult<()>;

    /// Copy field values from `other`, keeping identity and parent.
    fn merge_values(&mut self, other: &Self);
}

fn require_parent(kind: EntityKind, parent_id: Option<i64>) -> StoreResult<i64> {
    parent_id.ok_or(StoreError::UnresolvedParent { kind })
}

fn require_id<E: Entity>(entity: &E) -> StoreResult<i64> {
    entity
        .id()
        .ok_or(StoreError::NotPersisted { kind: E::KIND })
}

impl Persist for Address {
    fn parent(&self) -> Option<ParentRef> {
        None
    }

    fn find_stored(
        &self,
        store: &mut dyn RecordStore,
        _parent_id: Option<i64>,
    ) -> StoreResult<Option<Self>> {
        if let Some(icn) = self.location_icn {
            if let Some(found) = store.address_by_icn(icn)? {
                return Ok(Some(found));
            }
        }
        store.address_by_location(&self.street_line1, self.city.as_deref(), self.zip.as_deref())
    }

    fn insert(&self, store: &mut dyn RecordStore, _parent_id: Option<i64>) -> StoreResult<i64> {
        store.insert_address(self)
    }

    fn update(&self, store: &mut dyn RecordStore) -> StoreResult<()> {
        require_id(self)?;
        store.update_address(self)
    }

    fn merge_values(&mut self, other: &Self) {
        self.merge_from(other);
    }
}

impl Persist for Meter {
    fn parent(&self) -> Option<ParentRef> {
        Some(self.address)
    }

    fn find_stored(
        &self,
        store: &mut dyn RecordStore,
        parent_id: Option<i64>,
    ) -> StoreResult<Option<Self>> {
        match parent_id {
            Some(address_id) => store.meter_by_serial(self.serial_number, address_id),
            None => Ok(None),
        }
    }

    fn insert(&self, store: &mut dyn RecordStore, parent_id: Option<i64>) -> StoreResult<i64> {
        let address_id = require_parent(Self::KIND, parent_id)?;
        store.insert_meter(self, address_id)
    }

    fn update(&self, store: &mut dyn RecordStore) -> StoreResult<()> {
        require_id(self)?;
        store.update_meter(self)
    }

    fn merge_values(&mut self, other: &Self) {
        self.merge_from(other);
    }
}

impl Persist for Endpoint {
    fn parent(&self) -> Option<ParentRef> {
        Some(self.meter)
    }

    fn find_stored(
        &self,
        store: &mut dyn RecordStore,
        parent_id: Option<i64>,
    ) -> StoreResult<Option<Self>> {
        match parent_id {
            Some(meter_id) => store.endpoint_by_serial(self.serial_number, meter_id),
            None => Ok(None),
        }
    }

    fn insert(&self, store: &mut dyn RecordStore, parent_id: Option<i64>) -> StoreResult<i64> {
        let meter_id = require_parent(Self::KIND, parent_id)?;
        store.insert_endpoint(self, meter_id)
    }

    fn update(&self, store: &mut dyn RecordStore) -> StoreResult<()> {
        require_id(self)?;
        store.update_endpoint(self)
    }

    fn merge_values(&mut self, other: &Self) {
        self.merge_from(other);
    }
}

impl Persist for GisRecord {
    fn parent(&self) -> Option<ParentRef> {
        Some(self.endpoint)
    }

    fn find_stored(
        &self,
        store: &mut dyn RecordStore,
        parent_id: Option<i64>,
    ) -> StoreResult<Option<Self>> {
        if let Some(object_id) = self.object_id {
            if let Some(found) = store.gis_by_object_id(object_id)? {
                return Ok(Some(found));
            }
        }
        match parent_id {
            Some(endpoint_id) => store.gis_by_endpoint(endpoint_id),
            None => Ok(None),
        }
    }

    fn insert(&self, store: &mut dyn RecordStore, parent_id: Option<i64>) -> StoreResult<i64> {
        let endpoint_id = require_parent(Self::KIND, parent_id)?;
        store.insert_gis_record(self, endpoint_id)
    }

    fn update(&self, store: &mut dyn RecordStore) -> StoreResult<()> {
        require_id(self)?;
        store.update_gis_record(self)
    }

    fn merge_values(&mut self, other: &Self) {
        self.merge_from(other);
    }
}
