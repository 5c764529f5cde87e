// ⚖️ Entity Reconciler - find-or-build for each record kind
//
// For every row, in parent → child order:
//   1. validate the columns the kind needs
//   2. look in the current batch window by natural key
//   3. look in the store (primary key heuristic, then fallback)
//   4. otherwise build a new entity and stage it
//
// A batch hit is returned untouched. A store hit is refreshed from the row
// only in update mode.

use crate::entities::{
    Address, AddressKey, Endpoint, EndpointKey, Entity, EntityKind, GisKey, GisRecord, Meter,
    MeterKey, ParentRef,
};
use crate::error::StoreError;
use crate::parser::{parse_int, parse_text, CsvRow};
use crate::schema::{self, Problem, RequiredField, ValidationError};
use crate::staging::{Arena, Stage, StagingArea};
use crate::store::RecordStore;
use serde::Serialize;
use std::fmt;

// ============================================================================
// RESULTS
// ============================================================================

/// How one entity of a row was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub reference: ParentRef,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Built from this row and staged for insert.
    Added,
    /// Found in the store and staged for update.
    Updated,
    /// Already in the batch window, or found in the store with updates off.
    Unchanged,
}

/// Which store heuristic matched an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressMatch {
    Icn,
    Location,
}

/// Heuristic match worth a second look. The match is still taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityWarning {
    pub address_id: i64,
    pub matched_by: AddressMatch,
    pub row_icn: i32,
    pub stored_icn: i32,
    pub street: String,
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address {} ({:?}) matched by street/city/zip but Location_ICN differs: row {} vs stored {}",
            self.address_id, self.street, self.row_icn, self.stored_icn
        )
    }
}

/// Per-row tallies, applied to the run totals only when the row succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowTally {
    pub added: usize,
    pub updated: usize,
    pub warnings: Vec<QualityWarning>,
}

impl RowTally {
    /// In update mode every entity that already existed, in the batch window
    /// or in the store, counts as updated.
    fn record(&mut self, outcome: Outcome, update_existing: bool) {
        match outcome {
            Outcome::Added => self.added += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged if update_existing => self.updated += 1,
            Outcome::Unchanged => {}
        }
    }
}

/// Why a row contributed nothing.
#[derive(Debug)]
pub enum SkipReason {
    Invalid {
        kind: EntityKind,
        errors: Vec<ValidationError>,
    },
    Store {
        kind: EntityKind,
        source: StoreError,
    },
}

impl SkipReason {
    pub fn kind(&self) -> EntityKind {
        match self {
            SkipReason::Invalid { kind, .. } | SkipReason::Store { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Invalid { kind, errors } => {
                write!(f, "invalid {kind} data: {}", schema::describe(errors))
            }
            SkipReason::Store { kind, source } => {
                write!(f, "store error while resolving {kind}: {source}")
            }
        }
    }
}

// ============================================================================
// ROW RECONCILER
// ============================================================================

pub struct Reconciler<'a> {
    store: &'a mut dyn RecordStore,
    update_existing: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a mut dyn RecordStore, update_existing: bool) -> Self {
        Reconciler {
            store,
            update_existing,
        }
    }

    /// Resolve all four entities of one row into `staging`.
    ///
    /// On `Err` the caller must roll `staging` back to its pre-row checkpoint;
    /// entities resolved before the failing kind are still staged.
    pub fn reconcile_row(
        &mut self,
        row: &CsvRow,
        staging: &mut StagingArea,
    ) -> Result<RowTally, SkipReason> {
        let mut tally = RowTally::default();

        let address = self.resolve_address(row, &mut staging.addresses, &mut tally.warnings)?;
        tally.record(address.outcome, self.update_existing);

        let meter = self.resolve_meter(row, address.reference, &mut staging.meters)?;
        tally.record(meter.outcome, self.update_existing);

        let endpoint = self.resolve_endpoint(row, meter.reference, &mut staging.endpoints)?;
        tally.record(endpoint.outcome, self.update_existing);

        let gis = self.resolve_gis_record(row, endpoint.reference, &mut staging.gis_records)?;
        tally.record(gis.outcome, self.update_existing);

        Ok(tally)
    }

    // ========================================================================
    // ADDRESS
    // ========================================================================

    pub fn resolve_address(
        &mut self,
        row: &CsvRow,
        arena: &mut Arena<Address>,
        warnings: &mut Vec<QualityWarning>,
    ) -> Result<Resolved, SkipReason> {
        let kind = EntityKind::Address;
        schema::validate(row, kind).map_err(|errors| SkipReason::Invalid { kind, errors })?;

        if let Some(slot) = arena.find(&AddressKey::for_row(row)) {
            return Ok(unchanged(arena.reference(slot)));
        }

        let row_icn = parse_int(row.location_icn.as_deref());
        let street = parse_text(row.location_address_line1.as_deref()).unwrap_or_default();

        let found = self.lookup_address(row_icn, &street, row).map_err(|source| {
            tracing::error!(?row, error = %source, "address lookup failed");
            SkipReason::Store { kind, source }
        })?;

        match found {
            Some((stored, matched_by)) => {
                if let (AddressMatch::Location, Some(row_icn), Some(stored_icn)) =
                    (matched_by, row_icn, stored.location_icn)
                {
                    if row_icn != stored_icn {
                        warnings.push(QualityWarning {
                            address_id: stored.id.unwrap_or_default(),
                            matched_by,
                            row_icn,
                            stored_icn,
                            street: stored.street_line1.clone(),
                        });
                    }
                }
                Ok(self.stage_stored(arena, stored, |a| a.apply_row(row)))
            }
            None => {
                let slot = arena.push(Address::from_row(row), Stage::New);
                Ok(added(arena.reference(slot)))
            }
        }
    }

    fn lookup_address(
        &mut self,
        icn: Option<i32>,
        street: &str,
        row: &CsvRow,
    ) -> Result<Option<(Address, AddressMatch)>, StoreError> {
        if let Some(icn) = icn {
            if let Some(found) = self.store.address_by_icn(icn)? {
                return Ok(Some((found, AddressMatch::Icn)));
            }
        }
        Ok(self
            .store
            .address_by_location(street, row.city.as_deref(), row.zip.as_deref())?
            .map(|found| (found, AddressMatch::Location)))
    }

    // ========================================================================
    // METER
    // ========================================================================

    pub fn resolve_meter(
        &mut self,
        row: &CsvRow,
        address: ParentRef,
        arena: &mut Arena<Meter>,
    ) -> Result<Resolved, SkipReason> {
        let kind = EntityKind::Meter;
        schema::validate(row, kind).map_err(|errors| SkipReason::Invalid { kind, errors })?;
        let serial_number = required_serial(kind, RequiredField::MeterSerial, row.meter_sn.as_deref())?;

        let key = MeterKey {
            serial_number,
            address,
        };
        if let Some(slot) = arena.find(&[key]) {
            return Ok(unchanged(arena.reference(slot)));
        }

        let found = match address.stored_id() {
            Some(address_id) => self
                .store
                .meter_by_serial(serial_number, address_id)
                .map_err(|source| {
                    tracing::error!(?row, error = %source, "meter lookup failed");
                    SkipReason::Store { kind, source }
                })?,
            None => None,
        };

        match found {
            Some(stored) => Ok(self.stage_stored(arena, stored, |m| m.apply_row(row))),
            None => {
                let slot = arena.push(Meter::from_row(row, serial_number, address), Stage::New);
                Ok(added(arena.reference(slot)))
            }
        }
    }

    // ========================================================================
    // ENDPOINT
    // ========================================================================

    pub fn resolve_endpoint(
        &mut self,
        row: &CsvRow,
        meter: ParentRef,
        arena: &mut Arena<Endpoint>,
    ) -> Result<Resolved, SkipReason> {
        let kind = EntityKind::Endpoint;
        schema::validate(row, kind).map_err(|errors| SkipReason::Invalid { kind, errors })?;
        let serial_number =
            required_serial(kind, RequiredField::EndpointSerial, row.endpoint_sn.as_deref())?;

        let key = EndpointKey {
            serial_number,
            meter,
        };
        if let Some(slot) = arena.find(&[key]) {
            return Ok(unchanged(arena.reference(slot)));
        }

        let found = match meter.stored_id() {
            Some(meter_id) => self
                .store
                .endpoint_by_serial(serial_number, meter_id)
                .map_err(|source| {
                    tracing::error!(?row, error = %source, "endpoint lookup failed");
                    SkipReason::Store { kind, source }
                })?,
            None => None,
        };

        match found {
            Some(stored) => Ok(self.stage_stored(arena, stored, |e| e.serial_number = serial_number)),
            None => {
                let slot = arena.push(Endpoint::new(serial_number, meter), Stage::New);
                Ok(added(arena.reference(slot)))
            }
        }
    }

    // ========================================================================
    // GIS RECORD
    // ========================================================================

    pub fn resolve_gis_record(
        &mut self,
        row: &CsvRow,
        endpoint: ParentRef,
        arena: &mut Arena<GisRecord>,
    ) -> Result<Resolved, SkipReason> {
        let kind = EntityKind::GisRecord;
        schema::validate(row, kind).map_err(|errors| SkipReason::Invalid { kind, errors })?;

        let object_id = parse_int(row.object_id.as_deref());
        let mut keys = Vec::with_capacity(2);
        if let Some(object_id) = object_id {
            keys.push(GisKey::ObjectId(object_id));
        }
        keys.push(GisKey::Endpoint(endpoint));
        if let Some(slot) = arena.find(&keys) {
            return Ok(unchanged(arena.reference(slot)));
        }

        let found = self
            .lookup_gis_record(object_id, endpoint)
            .map_err(|source| {
                tracing::error!(?row, error = %source, "GIS record lookup failed");
                SkipReason::Store { kind, source }
            })?;

        match found {
            Some(stored) => Ok(self.stage_stored(arena, stored, |g| g.apply_row(row))),
            None => {
                let slot = arena.push(GisRecord::from_row(row, endpoint), Stage::New);
                Ok(added(arena.reference(slot)))
            }
        }
    }

    fn lookup_gis_record(
        &mut self,
        object_id: Option<i32>,
        endpoint: ParentRef,
    ) -> Result<Option<GisRecord>, StoreError> {
        if let Some(object_id) = object_id {
            if let Some(found) = self.store.gis_by_object_id(object_id)? {
                return Ok(Some(found));
            }
        }
        match endpoint.stored_id() {
            Some(endpoint_id) => self.store.gis_by_endpoint(endpoint_id),
            None => Ok(None),
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// A store hit: staged for update in update mode, otherwise referenced
    /// by id only. A record already staged in this window is reused as-is.
    fn stage_stored<E: Entity>(
        &self,
        arena: &mut Arena<E>,
        mut stored: E,
        refresh: impl FnOnce(&mut E),
    ) -> Resolved {
        let Some(id) = stored.id() else {
            // Store rows always carry an id; treat anything else as new.
            let slot = arena.push(stored, Stage::New);
            return added(arena.reference(slot));
        };

        if let Some(slot) = arena.find_id(id) {
            return unchanged(arena.reference(slot));
        }

        if !self.update_existing {
            return unchanged(ParentRef::Stored(id));
        }

        refresh(&mut stored);
        arena.push(stored, Stage::Update);
        Resolved {
            reference: ParentRef::Stored(id),
            outcome: Outcome::Updated,
        }
    }
}

fn unchanged(reference: ParentRef) -> Resolved {
    Resolved {
        reference,
        outcome: Outcome::Unchanged,
    }
}

fn added(reference: ParentRef) -> Resolved {
    Resolved {
        reference,
        outcome: Outcome::Added,
    }
}

fn required_serial(
    kind: EntityKind,
    field: RequiredField,
    raw: Option<&str>,
) -> Result<i32, SkipReason> {
    parse_int(raw).ok_or_else(|| SkipReason::Invalid {
        kind,
        errors: vec![ValidationError {
            kind,
            field,
            problem: Problem::Missing,
        }],
    })
}
