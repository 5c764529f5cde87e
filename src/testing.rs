// 🧪 Test support - CSV fixtures and a fault-injecting store

use crate::db::SqliteStore;
use crate::entities::{Address, Endpoint, EntityKind, GisRecord, Meter};
use crate::error::{StoreError, StoreResult};
use crate::parser::CsvRow;
use crate::store::RecordStore;

// ============================================================================
// FIXTURES
// ============================================================================

/// A complete, valid row. Address `n` is "{n} Elm St" with Location_ICN `n`.
pub fn fixture_row(address: i32, meter_sn: i32, endpoint_sn: i32) -> CsvRow {
    CsvRow {
        location_icn: Some(address.to_string()),
        location_address_line1: Some(format!("{address} Elm St")),
        city: Some("Springfield".to_string()),
        zip: Some("62701".to_string()),
        building_status: Some("Active".to_string()),
        meter_sn: Some(meter_sn.to_string()),
        meter_manufacturer: Some("Neptune".to_string()),
        meter_size_desc: Some("5/8\"".to_string()),
        endpoint_sn: Some(endpoint_sn.to_string()),
        collected_by: Some("crew-7".to_string()),
        ..CsvRow::default()
    }
}

pub const CSV_HEADER: &str = "Location_ICN,Location_Address_Line1,City,Zip,Building_Status,\
Meter_SN,Meter_Manufacturer,Meter_Size_Desc,Endpoint_SN,OBJECTID,CollectedBy";

/// One CSV line in `CSV_HEADER` column order.
pub fn csv_line(
    address: i32,
    meter_sn: i32,
    endpoint_sn: i32,
    object_id: Option<i32>,
    status: &str,
) -> String {
    format!(
        "{address},{address} Elm St,Springfield,62701,{status},{meter_sn},Neptune,5/8in,{endpoint_sn},{},crew-7",
        object_id.map(|id| id.to_string()).unwrap_or_default()
    )
}

/// Header plus `lines`, newline-terminated.
pub fn csv_document(lines: &[String]) -> String {
    let mut doc = String::from(CSV_HEADER);
    doc.push('\n');
    for line in lines {
        doc.push_str(line);
        doc.push('\n');
    }
    doc
}

/// `n` rows, each with its own address, meter, endpoint and GIS record.
pub fn distinct_rows(n: i32) -> String {
    let lines: Vec<String> = (1..=n)
        .map(|i| csv_line(i, 10_000 + i, 20_000 + i, Some(30_000 + i), "Active"))
        .collect();
    csv_document(&lines)
}

// ============================================================================
// FAULTY STORE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The next commit reports a unique violation and commits nothing.
    UniqueOnCommit,
    /// Every insert of this kind fails with a generic store error.
    InsertFails(EntityKind),
    /// Clearing this table fails with a generic store error.
    ClearFails(EntityKind),
    /// The next natural-key lookup of this kind fails with a generic store error.
    LookupFailsOnce(EntityKind),
}

/// `SqliteStore` with injectable failures.
pub struct FaultyStore {
    inner: SqliteStore,
    faults: Vec<Fault>,
}

fn injected() -> StoreError {
    StoreError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
        Some("injected fault".to_string()),
    ))
}

impl FaultyStore {
    pub fn new(inner: SqliteStore) -> Self {
        FaultyStore {
            inner,
            faults: Vec::new(),
        }
    }

    pub fn inject(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn lookup_guard(&mut self, kind: EntityKind) -> StoreResult<()> {
        if let Some(pos) = self.faults.iter().position(|f| *f == Fault::LookupFailsOnce(kind)) {
            self.faults.remove(pos);
            return Err(injected());
        }
        Ok(())
    }

    fn insert_guard(&self, kind: EntityKind) -> StoreResult<()> {
        if self.has(Fault::InsertFails(kind)) {
            return Err(injected());
        }
        Ok(())
    }
}

impl RecordStore for FaultyStore {
    fn begin(&mut self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        if let Some(pos) = self.faults.iter().position(|f| *f == Fault::UniqueOnCommit) {
            self.faults.remove(pos);
            return Err(StoreError::UniqueViolation("injected duplicate key".to_string()));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn suspend_integrity(&mut self) -> StoreResult<()> {
        self.inner.suspend_integrity()
    }

    fn restore_integrity(&mut self) -> StoreResult<()> {
        self.inner.restore_integrity()
    }

    fn clear_table(&mut self, kind: EntityKind) -> StoreResult<()> {
        if self.has(Fault::ClearFails(kind)) {
            return Err(injected());
        }
        self.inner.clear_table(kind)
    }

    fn address_by_icn(&mut self, icn: i32) -> StoreResult<Option<Address>> {
        self.lookup_guard(EntityKind::Address)?;
        self.inner.address_by_icn(icn)
    }

    fn address_by_location(
        &mut self,
        street: &str,
        city: Option<&str>,
        zip: Option<&str>,
    ) -> StoreResult<Option<Address>> {
        self.lookup_guard(EntityKind::Address)?;
        self.inner.address_by_location(street, city, zip)
    }

    fn meter_by_serial(&mut self, serial: i32, address_id: i64) -> StoreResult<Option<Meter>> {
        self.lookup_guard(EntityKind::Meter)?;
        self.inner.meter_by_serial(serial, address_id)
    }

    fn endpoint_by_serial(&mut self, serial: i32, meter_id: i64) -> StoreResult<Option<Endpoint>> {
        self.lookup_guard(EntityKind::Endpoint)?;
        self.inner.endpoint_by_serial(serial, meter_id)
    }

    fn gis_by_object_id(&mut self, object_id: i32) -> StoreResult<Option<GisRecord>> {
        self.lookup_guard(EntityKind::GisRecord)?;
        self.inner.gis_by_object_id(object_id)
    }

    fn gis_by_endpoint(&mut self, endpoint_id: i64) -> StoreResult<Option<GisRecord>> {
        self.lookup_guard(EntityKind::GisRecord)?;
        self.inner.gis_by_endpoint(endpoint_id)
    }

    fn insert_address(&mut self, address: &Address) -> StoreResult<i64> {
        self.insert_guard(EntityKind::Address)?;
        self.inner.insert_address(address)
    }

    fn insert_meter(&mut self, meter: &Meter, address_id: i64) -> StoreResult<i64> {
        self.insert_guard(EntityKind::Meter)?;
        self.inner.insert_meter(meter, address_id)
    }

    fn insert_endpoint(&mut self, endpoint: &Endpoint, meter_id: i64) -> StoreResult<i64> {
        self.insert_guard(EntityKind::Endpoint)?;
        self.inner.insert_endpoint(endpoint, meter_id)
    }

    fn insert_gis_record(&mut self, record: &GisRecord, endpoint_id: i64) -> StoreResult<i64> {
        self.insert_guard(EntityKind::GisRecord)?;
        self.inner.insert_gis_record(record, endpoint_id)
    }

    fn update_address(&mut self, address: &Address) -> StoreResult<()> {
        self.inner.update_address(address)
    }

    fn update_meter(&mut self, meter: &Meter) -> StoreResult<()> {
        self.inner.update_meter(meter)
    }

    fn update_endpoint(&mut self, endpoint: &Endpoint) -> StoreResult<()> {
        self.inner.update_endpoint(endpoint)
    }

    fn update_gis_record(&mut self, record: &GisRecord) -> StoreResult<()> {
        self.inner.update_gis_record(record)
    }

    fn count(&mut self, kind: EntityKind) -> StoreResult<i64> {
        self.inner.count(kind)
    }
}
