// 📣 Import events - what the pipeline reports while it runs
//
// The pipeline never logs its outcome directly; it emits `ImportEvent`s to an
// injected `ImportSink`. `TracingSink` turns them into log records,
// `RecordingSink` keeps them for inspection.

use crate::entities::EntityKind;
use crate::import::ImportSummary;
use crate::reconciliation::QualityWarning;
use crate::writer::{EntityFailure, FlushReport};
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    /// A row contributed nothing. `record` is the 1-based data record number.
    RowSkipped {
        record: u64,
        kind: Option<EntityKind>,
        reason: String,
    },
    /// The row-by-row pass could not persist one entity.
    EntityFailed { failure: EntityFailure },
    /// A batch window reached the store.
    BatchFlushed {
        flush: usize,
        processed: u64,
        report: FlushReport,
    },
    /// A heuristic match that may have merged distinct addresses.
    DataQuality {
        record: u64,
        warning: QualityWarning,
    },
    /// Share of the input consumed, when its size is known.
    Progress { percent: u8, message: String },
    /// The run stopped early; `discarded` staged entities were never written.
    Cancelled {
        discarded: usize,
        summary: ImportSummary,
    },
    Completed { summary: ImportSummary },
}

pub trait ImportSink: Send + Sync {
    fn emit(&self, event: &ImportEvent);
}

// ============================================================================
// TRACING SINK
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ImportSink for TracingSink {
    fn emit(&self, event: &ImportEvent) {
        match event {
            ImportEvent::RowSkipped {
                record,
                kind,
                reason,
            } => {
                tracing::warn!(record, kind = ?kind, %reason, "skipping record");
            }
            ImportEvent::EntityFailed { failure } => {
                tracing::warn!(
                    kind = %failure.kind,
                    entity = %failure.label,
                    reason = %failure.reason,
                    "entity not persisted"
                );
            }
            ImportEvent::BatchFlushed {
                flush,
                processed,
                report,
            } => {
                tracing::info!(
                    flush,
                    processed,
                    granularity = ?report.granularity,
                    addresses = report.persisted(EntityKind::Address),
                    meters = report.persisted(EntityKind::Meter),
                    endpoints = report.persisted(EntityKind::Endpoint),
                    gis_records = report.persisted(EntityKind::GisRecord),
                    failed = report.failures.len(),
                    "batch committed"
                );
            }
            ImportEvent::DataQuality { record, warning } => {
                tracing::warn!(record, address_id = warning.address_id, "{warning}");
            }
            ImportEvent::Progress { percent, message } => {
                tracing::info!(percent, "{message}");
            }
            ImportEvent::Cancelled { discarded, summary } => {
                tracing::warn!(
                    run_id = %summary.run_id,
                    discarded,
                    processed = summary.processed,
                    "import cancelled"
                );
            }
            ImportEvent::Completed { summary } => {
                tracing::info!(
                    run_id = %summary.run_id,
                    total = summary.total,
                    processed = summary.processed,
                    added = summary.added,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "import completed"
                );
            }
        }
    }
}

// ============================================================================
// RECORDING SINK
// ============================================================================

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ImportEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ImportEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn flush_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ImportEvent::BatchFlushed { .. }))
            .count()
    }

    pub fn skipped(&self) -> Vec<(u64, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::RowSkipped { record, reason, .. } => Some((record, reason)),
                _ => None,
            })
            .collect()
    }
}

impl ImportSink for RecordingSink {
    fn emit(&self, event: &ImportEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
