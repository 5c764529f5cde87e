// ✍️ Transactional Writer - persists one batch window
//
// Two strategies, run in order:
//   1. BatchTransaction: the whole window in one transaction
//   2. RowByRow: only after a unique-constraint violation rolled (1) back;
//      every entity is retried on its own with fresh natural-key reads
//
// Ids are collected in a side table and written back to the staged entities
// only once the writes that produced them are committed.

use crate::entities::{Entity, EntityKind, ParentRef};
use crate::error::{StoreError, StoreResult};
use crate::staging::{Arena, Stage, StagingArea};
use crate::store::{Persist, RecordStore};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

// ============================================================================
// FLUSH REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Granularity {
    BatchTransaction,
    RowByRow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub addresses: usize,
    pub meters: usize,
    pub endpoints: usize,
    pub gis_records: usize,
}

impl KindCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Address => self.addresses,
            EntityKind::Meter => self.meters,
            EntityKind::Endpoint => self.endpoints,
            EntityKind::GisRecord => self.gis_records,
        }
    }

    fn bump(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Address => self.addresses += 1,
            EntityKind::Meter => self.meters += 1,
            EntityKind::Endpoint => self.endpoints += 1,
            EntityKind::GisRecord => self.gis_records += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.addresses + self.meters + self.endpoints + self.gis_records
    }
}

/// An entity the row-by-row pass could not persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub kind: EntityKind,
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub granularity: Granularity,
    /// Rows created by an insert.
    pub inserted: KindCounts,
    /// Rows rewritten by id (staged updates, and merges in update mode).
    pub updated: KindCounts,
    /// New entities that turned out to exist already; their id was adopted.
    pub adopted: KindCounts,
    pub failures: Vec<EntityFailure>,
    /// Entities never attempted because the run was cancelled.
    pub unwritten: usize,
}

impl FlushReport {
    fn new(granularity: Granularity) -> Self {
        FlushReport {
            granularity,
            inserted: KindCounts::default(),
            updated: KindCounts::default(),
            adopted: KindCounts::default(),
            failures: Vec::new(),
            unwritten: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.unwritten > 0
    }

    /// Entities persisted for `kind`, whatever the action.
    pub fn persisted(&self, kind: EntityKind) -> usize {
        self.inserted.get(kind) + self.updated.get(kind) + self.adopted.get(kind)
    }
}

// ============================================================================
// RESOLVED IDS
// ============================================================================

/// Slot → id for every staged entity, filled in as a pass writes them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedIds {
    addresses: Vec<Option<i64>>,
    meters: Vec<Option<i64>>,
    endpoints: Vec<Option<i64>>,
    gis_records: Vec<Option<i64>>,
}

fn seed<E: Entity>(arena: &Arena<E>) -> Vec<Option<i64>> {
    arena.iter().map(|staged| staged.entity.id()).collect()
}

impl ResolvedIds {
    fn seed(batch: &StagingArea) -> Self {
        ResolvedIds {
            addresses: seed(&batch.addresses),
            meters: seed(&batch.meters),
            endpoints: seed(&batch.endpoints),
            gis_records: seed(&batch.gis_records),
        }
    }

    fn assign(self, batch: &mut StagingArea) {
        assign(&mut batch.addresses, self.addresses);
        assign(&mut batch.meters, self.meters);
        assign(&mut batch.endpoints, self.endpoints);
        assign(&mut batch.gis_records, self.gis_records);
    }
}

fn assign<E: Entity>(arena: &mut Arena<E>, ids: Vec<Option<i64>>) {
    for (slot, id) in ids.into_iter().enumerate() {
        if let Some(id) = id {
            arena.assign_id(slot, id);
        }
    }
}

fn resolve_parent(parent: Option<ParentRef>, parent_ids: &[Option<i64>]) -> Option<i64> {
    match parent? {
        ParentRef::Stored(id) => Some(id),
        ParentRef::Staged(slot) => parent_ids.get(slot).copied().flatten(),
    }
}

// ============================================================================
// SINGLE ENTITY WRITE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Inserted,
    Updated,
    Adopted,
}

/// Persist one staged entity. New entities are re-checked by natural key
/// first; an existing row's id is adopted (and merged onto in update mode).
fn write_one<E: Persist>(
    store: &mut dyn RecordStore,
    entity: &E,
    stage: Stage,
    parent_id: Option<i64>,
    update_existing: bool,
) -> StoreResult<(i64, Action)> {
    if stage == Stage::Update {
        let id = entity
            .id()
            .ok_or(StoreError::NotPersisted { kind: E::KIND })?;
        entity.update(store)?;
        return Ok((id, Action::Updated));
    }

    if let Some(mut existing) = entity.find_stored(store, parent_id)? {
        let id = existing
            .id()
            .ok_or(StoreError::NotPersisted { kind: E::KIND })?;
        if update_existing {
            existing.merge_values(entity);
            existing.update(store)?;
            return Ok((id, Action::Updated));
        }
        return Ok((id, Action::Adopted));
    }

    let id = entity.insert(store, parent_id)?;
    Ok((id, Action::Inserted))
}

fn tally(report: &mut FlushReport, kind: EntityKind, action: Action) {
    match action {
        Action::Inserted => report.inserted.bump(kind),
        Action::Updated => report.updated.bump(kind),
        Action::Adopted => report.adopted.bump(kind),
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// Result of one strategy run: what happened, and the ids it committed.
#[derive(Debug)]
pub struct Pass {
    pub report: FlushReport,
    ids: ResolvedIds,
}

/// One way of getting a batch window into the store.
pub trait FlushStrategy {
    fn granularity(&self) -> Granularity;

    fn write(
        &self,
        store: &mut dyn RecordStore,
        batch: &StagingArea,
        cancel: &CancellationToken,
    ) -> StoreResult<Pass>;
}

/// Everything in one transaction; any error rolls the whole window back.
pub struct BatchTransaction {
    pub update_existing: bool,
}

impl BatchTransaction {
    fn write_kind<E: Persist>(
        &self,
        store: &mut dyn RecordStore,
        arena: &Arena<E>,
        ids: &mut [Option<i64>],
        parent_ids: &[Option<i64>],
        report: &mut FlushReport,
    ) -> StoreResult<()> {
        for (slot, staged) in arena.iter().enumerate() {
            let parent_id = resolve_parent(staged.entity.parent(), parent_ids);
            let (id, action) =
                write_one(store, &staged.entity, staged.stage, parent_id, self.update_existing)?;
            ids[slot] = Some(id);
            tally(report, E::KIND, action);
        }
        Ok(())
    }

    fn write_all(
        &self,
        store: &mut dyn RecordStore,
        batch: &StagingArea,
        ids: &mut ResolvedIds,
        report: &mut FlushReport,
    ) -> StoreResult<()> {
        self.write_kind(store, &batch.addresses, &mut ids.addresses, &[], report)?;
        self.write_kind(store, &batch.meters, &mut ids.meters, &ids.addresses, report)?;
        self.write_kind(store, &batch.endpoints, &mut ids.endpoints, &ids.meters, report)?;
        self.write_kind(store, &batch.gis_records, &mut ids.gis_records, &ids.endpoints, report)?;
        Ok(())
    }
}

impl FlushStrategy for BatchTransaction {
    fn granularity(&self) -> Granularity {
        Granularity::BatchTransaction
    }

    fn write(
        &self,
        store: &mut dyn RecordStore,
        batch: &StagingArea,
        _cancel: &CancellationToken,
    ) -> StoreResult<Pass> {
        let mut ids = ResolvedIds::seed(batch);
        let mut report = FlushReport::new(self.granularity());

        store.begin()?;
        let written = self
            .write_all(store, batch, &mut ids, &mut report)
            .and_then(|()| store.commit());

        if let Err(err) = written {
            if let Err(rollback_err) = store.rollback() {
                tracing::error!(error = %rollback_err, "rollback after failed batch also failed");
            }
            return Err(err);
        }

        Ok(Pass { report, ids })
    }
}

/// Each entity on its own. Failures are recorded and skipped; children of a
/// failed parent are not attempted.
pub struct RowByRow {
    pub update_existing: bool,
}

impl RowByRow {
    fn write_kind<E: Persist>(
        &self,
        store: &mut dyn RecordStore,
        arena: &Arena<E>,
        ids: &mut [Option<i64>],
        parent_ids: &[Option<i64>],
        report: &mut FlushReport,
        cancel: &CancellationToken,
    ) {
        for (slot, staged) in arena.iter().enumerate() {
            if cancel.is_cancelled() {
                report.unwritten += arena.len() - slot;
                return;
            }

            let parent = staged.entity.parent();
            let parent_id = resolve_parent(parent, parent_ids);
            if parent.is_some() && parent_id.is_none() {
                tracing::warn!(entity = %staged.entity.label(), "parent not persisted, skipping");
                report.failures.push(EntityFailure {
                    kind: E::KIND,
                    label: staged.entity.label(),
                    reason: "parent not persisted".to_string(),
                });
                continue;
            }

            match write_one(store, &staged.entity, staged.stage, parent_id, self.update_existing) {
                Ok((id, action)) => {
                    ids[slot] = Some(id);
                    tally(report, E::KIND, action);
                }
                Err(err) => {
                    tracing::warn!(entity = %staged.entity.label(), error = %err, "row-by-row write failed");
                    report.failures.push(EntityFailure {
                        kind: E::KIND,
                        label: staged.entity.label(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

impl FlushStrategy for RowByRow {
    fn granularity(&self) -> Granularity {
        Granularity::RowByRow
    }

    fn write(
        &self,
        store: &mut dyn RecordStore,
        batch: &StagingArea,
        cancel: &CancellationToken,
    ) -> StoreResult<Pass> {
        let mut ids = ResolvedIds::seed(batch);
        let mut report = FlushReport::new(self.granularity());

        self.write_kind(store, &batch.addresses, &mut ids.addresses, &[], &mut report, cancel);
        self.write_kind(store, &batch.meters, &mut ids.meters, &ids.addresses, &mut report, cancel);
        self.write_kind(store, &batch.endpoints, &mut ids.endpoints, &ids.meters, &mut report, cancel);
        self.write_kind(
            store,
            &batch.gis_records,
            &mut ids.gis_records,
            &ids.endpoints,
            &mut report,
            cancel,
        );

        Ok(Pass { report, ids })
    }
}

// ============================================================================
// WRITER
// ============================================================================

pub struct Writer {
    update_existing: bool,
    cancel: CancellationToken,
}

impl Writer {
    pub fn new(update_existing: bool, cancel: CancellationToken) -> Self {
        Writer {
            update_existing,
            cancel,
        }
    }

    /// Persist `batch`. Committed ids are written back onto its entities.
    ///
    /// A unique-constraint violation falls back to row-by-row; any other store
    /// error is returned after the batch transaction was rolled back.
    pub fn flush(
        &self,
        store: &mut dyn RecordStore,
        batch: &mut StagingArea,
    ) -> StoreResult<FlushReport> {
        if self.cancel.is_cancelled() {
            let mut report = FlushReport::new(Granularity::BatchTransaction);
            report.unwritten = batch.len();
            return Ok(report);
        }

        let primary = BatchTransaction {
            update_existing: self.update_existing,
        };
        let Pass { report, ids } = match primary.write(store, batch, &self.cancel) {
            Ok(done) => done,
            Err(err) if err.is_unique_violation() => {
                tracing::warn!(error = %err, "batch transaction hit a unique constraint, retrying row by row");
                let fallback = RowByRow {
                    update_existing: self.update_existing,
                };
                fallback.write(store, batch, &self.cancel)?
            }
            Err(err) => return Err(err),
        };

        ids.assign(batch);
        tracing::debug!(
            granularity = ?report.granularity,
            inserted = report.inserted.total(),
            updated = report.updated.total(),
            adopted = report.adopted.total(),
            failed = report.failures.len(),
            "batch written"
        );
        Ok(report)
    }
}
