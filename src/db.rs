// 💾 SQLite Store - schema setup and the production RecordStore
//
// Decimals are stored as TEXT so no precision is lost; timestamps use
// rusqlite's chrono mapping (TEXT, "YYYY-MM-DD HH:MM:SS.fff").

use crate::entities::{Address, Endpoint, EntityKind, GisRecord, Meter, ParentRef};
use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("Failed to enable foreign keys")?;

    // ==========================================================================
    // Addresses
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            location_icn INTEGER,
            street_line1 TEXT NOT NULL,
            serv_pt_id INTEGER,
            mtr_desc TEXT,
            latitude TEXT,
            longitude TEXT,
            height TEXT,
            building_year INTEGER,
            building_status TEXT,
            city TEXT,
            zip TEXT,
            serv_est_date TEXT,
            serv_year_final INTEGER,
            sl_install_ticket_date TEXT,
            sl_material_us TEXT,
            sl_material_cust_side TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Meters
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address_id INTEGER NOT NULL REFERENCES addresses(id),
            route_number INTEGER,
            read_sequence INTEGER,
            read_order INTEGER,
            serial_number INTEGER NOT NULL,
            manufacturer TEXT NOT NULL,
            size_description TEXT NOT NULL,
            latitude TEXT,
            longitude TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Endpoints
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meter_id INTEGER NOT NULL REFERENCES meters(id),
            serial_number INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // GIS records
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS gis_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            endpoint_id INTEGER NOT NULL REFERENCES endpoints(id),
            object_id INTEGER,
            collected_by TEXT,
            device_type TEXT,
            device_id TEXT,
            corr_status TEXT,
            corr_source TEXT,
            creation_date_time TEXT,
            update_date_time TEXT,
            horiz_est_acc TEXT,
            vert_est_acc TEXT,
            geom_capture_type TEXT,
            x_current_map_cs TEXT,
            y_current_map_cs TEXT,
            pdop TEXT,
            hdop TEXT,
            feature_height TEXT,
            accuracy_reporting TEXT,
            task_name TEXT,
            project_name TEXT,
            auto_increment_alpha TEXT,
            auto_increment_numeric INTEGER,
            sl_size TEXT,
            class_source_util TEXT,
            class_source_cust TEXT,
            sl_material_all TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Natural-key indexes (last line of defence against duplicate imports)
    // ==========================================================================
    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_addresses_icn
             ON addresses(location_icn);
         CREATE UNIQUE INDEX IF NOT EXISTS ux_addresses_location
             ON addresses(
                 street_line1 COLLATE NOCASE,
                 IFNULL(city, '') COLLATE NOCASE,
                 IFNULL(zip, '') COLLATE NOCASE
             );
         CREATE UNIQUE INDEX IF NOT EXISTS ux_meters_serial
             ON meters(serial_number, address_id);
         CREATE UNIQUE INDEX IF NOT EXISTS ux_endpoints_serial
             ON endpoints(serial_number, meter_id);
         CREATE UNIQUE INDEX IF NOT EXISTS ux_gis_object_id
             ON gis_records(object_id);
         CREATE UNIQUE INDEX IF NOT EXISTS ux_gis_endpoint
             ON gis_records(endpoint_id);",
    )
    .context("Failed to create natural-key indexes")?;

    Ok(())
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

fn decimal_text(value: &Option<Decimal>) -> Option<String> {
    value.as_ref().map(Decimal::to_string)
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Decimal::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

const ADDRESS_COLUMNS: &str = "id, location_icn, street_line1, serv_pt_id, mtr_desc,
    latitude, longitude, height, building_year, building_status, city, zip,
    serv_est_date, serv_year_final, sl_install_ticket_date, sl_material_us,
    sl_material_cust_side";

fn address_from_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        id: Some(row.get(0)?),
        location_icn: row.get(1)?,
        street_line1: row.get(2)?,
        serv_pt_id: row.get(3)?,
        mtr_desc: row.get(4)?,
        latitude: decimal_column(row, 5)?,
        longitude: decimal_column(row, 6)?,
        height: decimal_column(row, 7)?,
        building_year: row.get(8)?,
        building_status: row.get(9)?,
        city: row.get(10)?,
        zip: row.get(11)?,
        serv_est_date: row.get(12)?,
        serv_year_final: row.get(13)?,
        sl_install_ticket_date: row.get(14)?,
        sl_material_us: row.get(15)?,
        sl_material_cust_side: row.get(16)?,
    })
}

const METER_COLUMNS: &str = "id, address_id, route_number, read_sequence, read_order,
    serial_number, manufacturer, size_description, latitude, longitude";

fn meter_from_row(row: &Row<'_>) -> rusqlite::Result<Meter> {
    Ok(Meter {
        id: Some(row.get(0)?),
        address: ParentRef::Stored(row.get(1)?),
        route_number: row.get(2)?,
        read_sequence: row.get(3)?,
        read_order: row.get(4)?,
        serial_number: row.get(5)?,
        manufacturer: row.get(6)?,
        size_description: row.get(7)?,
        latitude: decimal_column(row, 8)?,
        longitude: decimal_column(row, 9)?,
    })
}

fn endpoint_from_row(row: &Row<'_>) -> rusqlite::Result<Endpoint> {
    Ok(Endpoint {
        id: Some(row.get(0)?),
        meter: ParentRef::Stored(row.get(1)?),
        serial_number: row.get(2)?,
    })
}

const GIS_COLUMNS: &str = "id, endpoint_id, object_id, collected_by, device_type,
    device_id, corr_status, corr_source, creation_date_time, update_date_time,
    horiz_est_acc, vert_est_acc, geom_capture_type, x_current_map_cs,
    y_current_map_cs, pdop, hdop, feature_height, accuracy_reporting, task_name,
    project_name, auto_increment_alpha, auto_increment_numeric, sl_size,
    class_source_util, class_source_cust, sl_material_all";

fn gis_from_row(row: &Row<'_>) -> rusqlite::Result<GisRecord> {
    Ok(GisRecord {
        id: Some(row.get(0)?),
        endpoint: ParentRef::Stored(row.get(1)?),
        object_id: row.get(2)?,
        collected_by: row.get(3)?,
        device_type: row.get(4)?,
        device_id: row.get(5)?,
        corr_status: row.get(6)?,
        corr_source: row.get(7)?,
        creation_date_time: row.get(8)?,
        update_date_time: row.get(9)?,
        horiz_est_acc: decimal_column(row, 10)?,
        vert_est_acc: decimal_column(row, 11)?,
        geom_capture_type: row.get(12)?,
        x_current_map_cs: decimal_column(row, 13)?,
        y_current_map_cs: decimal_column(row, 14)?,
        pdop: decimal_column(row, 15)?,
        hdop: decimal_column(row, 16)?,
        feature_height: decimal_column(row, 17)?,
        accuracy_reporting: row.get(18)?,
        task_name: row.get(19)?,
        project_name: row.get(20)?,
        auto_increment_alpha: row.get(21)?,
        auto_increment_numeric: row.get(22)?,
        sl_size: row.get(23)?,
        class_source_util: row.get(24)?,
        class_source_cust: row.get(25)?,
        sl_material_all: row.get(26)?,
    })
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file. WAL journaling for crash recovery.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn begin(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // `foreign_keys` cannot change inside a transaction; deferring the checks
    // to commit is the in-transaction equivalent.
    fn suspend_integrity(&mut self) -> StoreResult<()> {
        self.conn.pragma_update(None, "defer_foreign_keys", "ON")?;
        Ok(())
    }

    fn restore_integrity(&mut self) -> StoreResult<()> {
        self.conn.pragma_update(None, "defer_foreign_keys", "OFF")?;
        Ok(())
    }

    fn clear_table(&mut self, kind: EntityKind) -> StoreResult<()> {
        let table = kind.table();
        self.conn.execute(&format!("DELETE FROM {table}"), [])?;
        self.conn
            .execute("DELETE FROM sqlite_sequence WHERE name = ?1", params![table])?;
        Ok(())
    }

    fn address_by_icn(&mut self, icn: i32) -> StoreResult<Option<Address>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE location_icn = ?1 LIMIT 1"
        ))?;
        Ok(stmt.query_row(params![icn], address_from_row).optional()?)
    }

    fn address_by_location(
        &mut self,
        street: &str,
        city: Option<&str>,
        zip: Option<&str>,
    ) -> StoreResult<Option<Address>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses
             WHERE street_line1 = ?1 COLLATE NOCASE
               AND IFNULL(city, '') = IFNULL(?2, '') COLLATE NOCASE
               AND IFNULL(zip, '') = IFNULL(?3, '') COLLATE NOCASE
             ORDER BY id LIMIT 1"
        ))?;
        Ok(stmt
            .query_row(params![street.trim(), city.map(str::trim), zip.map(str::trim)], address_from_row)
            .optional()?)
    }

    fn meter_by_serial(&mut self, serial: i32, address_id: i64) -> StoreResult<Option<Meter>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE serial_number = ?1 AND address_id = ?2"
        ))?;
        Ok(stmt.query_row(params![serial, address_id], meter_from_row).optional()?)
    }

    fn endpoint_by_serial(&mut self, serial: i32, meter_id: i64) -> StoreResult<Option<Endpoint>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, meter_id, serial_number FROM endpoints
             WHERE serial_number = ?1 AND meter_id = ?2",
        )?;
        Ok(stmt.query_row(params![serial, meter_id], endpoint_from_row).optional()?)
    }

    fn gis_by_object_id(&mut self, object_id: i32) -> StoreResult<Option<GisRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {GIS_COLUMNS} FROM gis_records WHERE object_id = ?1"
        ))?;
        Ok(stmt.query_row(params![object_id], gis_from_row).optional()?)
    }

    fn gis_by_endpoint(&mut self, endpoint_id: i64) -> StoreResult<Option<GisRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {GIS_COLUMNS} FROM gis_records WHERE endpoint_id = ?1"
        ))?;
        Ok(stmt.query_row(params![endpoint_id], gis_from_row).optional()?)
    }

    fn insert_address(&mut self, a: &Address) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO addresses (
                location_icn, street_line1, serv_pt_id, mtr_desc, latitude, longitude,
                height, building_year, building_status, city, zip, serv_est_date,
                serv_year_final, sl_install_ticket_date, sl_material_us, sl_material_cust_side
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                a.location_icn,
                a.street_line1,
                a.serv_pt_id,
                a.mtr_desc,
                decimal_text(&a.latitude),
                decimal_text(&a.longitude),
                decimal_text(&a.height),
                a.building_year,
                a.building_status,
                a.city,
                a.zip,
                a.serv_est_date,
                a.serv_year_final,
                a.sl_install_ticket_date,
                a.sl_material_us,
                a.sl_material_cust_side,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_meter(&mut self, m: &Meter, address_id: i64) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO meters (
                address_id, route_number, read_sequence, read_order, serial_number,
                manufacturer, size_description, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                address_id,
                m.route_number,
                m.read_sequence,
                m.read_order,
                m.serial_number,
                m.manufacturer,
                m.size_description,
                decimal_text(&m.latitude),
                decimal_text(&m.longitude),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_endpoint(&mut self, e: &Endpoint, meter_id: i64) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO endpoints (meter_id, serial_number) VALUES (?1, ?2)",
            params![meter_id, e.serial_number],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_gis_record(&mut self, g: &GisRecord, endpoint_id: i64) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO gis_records (
                endpoint_id, object_id, collected_by, device_type, device_id, corr_status,
                corr_source, creation_date_time, update_date_time, horiz_est_acc,
                vert_est_acc, geom_capture_type, x_current_map_cs, y_current_map_cs, pdop,
                hdop, feature_height, accuracy_reporting, task_name, project_name,
                auto_increment_alpha, auto_increment_numeric, sl_size, class_source_util,
                class_source_cust, sl_material_all
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            params![
                endpoint_id,
                g.object_id,
                g.collected_by,
                g.device_type,
                g.device_id,
                g.corr_status,
                g.corr_source,
                g.creation_date_time,
                g.update_date_time,
                decimal_text(&g.horiz_est_acc),
                decimal_text(&g.vert_est_acc),
                g.geom_capture_type,
                decimal_text(&g.x_current_map_cs),
                decimal_text(&g.y_current_map_cs),
                decimal_text(&g.pdop),
                decimal_text(&g.hdop),
                decimal_text(&g.feature_height),
                g.accuracy_reporting,
                g.task_name,
                g.project_name,
                g.auto_increment_alpha,
                g.auto_increment_numeric,
                g.sl_size,
                g.class_source_util,
                g.class_source_cust,
                g.sl_material_all,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_address(&mut self, a: &Address) -> StoreResult<()> {
        let id = a.id.ok_or(StoreError::NotPersisted { kind: EntityKind::Address })?;
        self.conn.execute(
            "UPDATE addresses SET
                location_icn = ?2, street_line1 = ?3, serv_pt_id = ?4, mtr_desc = ?5,
                latitude = ?6, longitude = ?7, height = ?8, building_year = ?9,
                building_status = ?10, city = ?11, zip = ?12, serv_est_date = ?13,
                serv_year_final = ?14, sl_install_ticket_date = ?15,
                sl_material_us = ?16, sl_material_cust_side = ?17
             WHERE id = ?1",
            params![
                id,
                a.location_icn,
                a.street_line1,
                a.serv_pt_id,
                a.mtr_desc,
                decimal_text(&a.latitude),
                decimal_text(&a.longitude),
                decimal_text(&a.height),
                a.building_year,
                a.building_status,
                a.city,
                a.zip,
                a.serv_est_date,
                a.serv_year_final,
                a.sl_install_ticket_date,
                a.sl_material_us,
                a.sl_material_cust_side,
            ],
        )?;
        Ok(())
    }

    fn update_meter(&mut self, m: &Meter) -> StoreResult<()> {
        let id = m.id.ok_or(StoreError::NotPersisted { kind: EntityKind::Meter })?;
        self.conn.execute(
            "UPDATE meters SET
                route_number = ?2, read_sequence = ?3, read_order = ?4,
                manufacturer = ?5, size_description = ?6, latitude = ?7, longitude = ?8
             WHERE id = ?1",
            params![
                id,
                m.route_number,
                m.read_sequence,
                m.read_order,
                m.manufacturer,
                m.size_description,
                decimal_text(&m.latitude),
                decimal_text(&m.longitude),
            ],
        )?;
        Ok(())
    }

    fn update_endpoint(&mut self, e: &Endpoint) -> StoreResult<()> {
        let id = e.id.ok_or(StoreError::NotPersisted { kind: EntityKind::Endpoint })?;
        self.conn.execute(
            "UPDATE endpoints SET serial_number = ?2 WHERE id = ?1",
            params![id, e.serial_number],
        )?;
        Ok(())
    }

    fn update_gis_record(&mut self, g: &GisRecord) -> StoreResult<()> {
        let id = g.id.ok_or(StoreError::NotPersisted { kind: EntityKind::GisRecord })?;
        self.conn.execute(
            "UPDATE gis_records SET
                object_id = ?2, collected_by = ?3, device_type = ?4, device_id = ?5,
                corr_status = ?6, corr_source = ?7, creation_date_time = ?8,
                update_date_time = ?9, horiz_est_acc = ?10, vert_est_acc = ?11,
                geom_capture_type = ?12, x_current_map_cs = ?13, y_current_map_cs = ?14,
                pdop = ?15, hdop = ?16, feature_height = ?17, accuracy_reporting = ?18,
                task_name = ?19, project_name = ?20, auto_increment_alpha = ?21,
                auto_increment_numeric = ?22, sl_size = ?23, class_source_util = ?24,
                class_source_cust = ?25, sl_material_all = ?26
             WHERE id = ?1",
            params![
                id,
                g.object_id,
                g.collected_by,
                g.device_type,
                g.device_id,
                g.corr_status,
                g.corr_source,
                g.creation_date_time,
                g.update_date_time,
                decimal_text(&g.horiz_est_acc),
                decimal_text(&g.vert_est_acc),
                g.geom_capture_type,
                decimal_text(&g.x_current_map_cs),
                decimal_text(&g.y_current_map_cs),
                decimal_text(&g.pdop),
                decimal_text(&g.hdop),
                decimal_text(&g.feature_height),
                g.accuracy_reporting,
                g.task_name,
                g.project_name,
                g.auto_increment_alpha,
                g.auto_increment_numeric,
                g.sl_size,
                g.class_source_util,
                g.class_source_cust,
                g.sl_material_all,
            ],
        )?;
        Ok(())
    }

    fn count(&mut self, kind: EntityKind) -> StoreResult<i64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CsvRow;

    fn create_test_address(icn: Option<&str>, street: &str, city: Option<&str>) -> Address {
        Address::from_row(&CsvRow {
            location_icn: icn.map(str::to_string),
            location_address_line1: Some(street.to_string()),
            city: city.map(str::to_string),
            zip: Some("62701".to_string()),
            location_latitude: Some("39.781721".to_string()),
            serv_est_date: Some("2021-03-04 10:30:00".to_string()),
            ..CsvRow::default()
        })
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();
    }

    #[test]
    fn test_address_roundtrip_keeps_decimal_and_timestamp() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let address = create_test_address(Some("42"), "12 Elm St", Some("Springfield"));

        let id = store.insert_address(&address).unwrap();
        let loaded = store.address_by_icn(42).unwrap().unwrap();

        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.latitude, address.latitude);
        assert_eq!(loaded.serv_est_date, address.serv_est_date);
    }

    #[test]
    fn test_location_lookup_treats_missing_city_as_empty() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let address = create_test_address(None, "12 Elm St", None);
        let id = store.insert_address(&address).unwrap();

        let found = store
            .address_by_location("12 elm st", Some(""), Some("62701"))
            .unwrap();

        assert_eq!(found.and_then(|a| a.id), Some(id));
    }

    #[test]
    fn test_duplicate_location_is_unique_violation() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_address(&create_test_address(None, "12 Elm St", Some("Springfield")))
            .unwrap();

        let err = store
            .insert_address(&create_test_address(None, "12 ELM ST", Some("springfield")))
            .unwrap_err();

        assert!(err.is_unique_violation(), "got {err:?}");
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let meter = Meter::from_row(&CsvRow::default(), 1001, ParentRef::Stored(999));

        let err = store.insert_meter(&meter, 999).unwrap_err();

        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_rollback_discards_and_is_noop_outside_transaction() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.rollback().unwrap();

        store.begin().unwrap();
        store
            .insert_address(&create_test_address(Some("1"), "1 Main St", None))
            .unwrap();
        store.rollback().unwrap();

        assert_eq!(store.count(EntityKind::Address).unwrap(), 0);
    }

    #[test]
    fn test_clear_table_restarts_ids() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_address(&create_test_address(Some("1"), "1 Main St", None))
            .unwrap();
        store.clear_table(EntityKind::Address).unwrap();

        let id = store
            .insert_address(&create_test_address(Some("2"), "2 Main St", None))
            .unwrap();

        assert_eq!(id, 1);
    }

    #[test]
    fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("changeout.db")).unwrap();

        let mode: String = store
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();

        assert_eq!(mode.to_lowercase(), "wal");
    }
}
