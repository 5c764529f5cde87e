// 🚚 Batch Coordinator - drives one CSV import from stream to summary
//
// State machine:
//
//   Idle → Streaming ⇄ Flushing
//              ↓          ↓
//           Draining → Done
//   Idle/Streaming/Flushing → Aborted (cancellation)
//
// Rows are handled strictly in order because in-batch deduplication depends on
// seeing earlier rows. A row either stages all of its entities or none.

use crate::entities::EntityKind;
use crate::error::{ConfigError, ImportError};
use crate::events::{ImportEvent, ImportSink, TracingSink};
use crate::parser::{csv_reader, CsvRow};
use crate::reconciliation::Reconciler;
use crate::reset::reset_all;
use crate::staging::StagingArea;
use crate::store::RecordStore;
use crate::writer::Writer;
use csv::ByteRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 500;

// ============================================================================
// IMPORT MODE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMode {
    /// Insert new records, refresh the ones that already exist.
    #[default]
    UpdateAndAdd,
    /// Insert new records, leave existing ones untouched.
    AddOnly,
    /// Empty every table first, then insert.
    DropAndReplace,
}

impl ImportMode {
    pub fn update_existing(&self) -> bool {
        matches!(self, ImportMode::UpdateAndAdd)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::UpdateAndAdd => "UpdateAndAdd",
            ImportMode::AddOnly => "AddOnly",
            ImportMode::DropAndReplace => "DropAndReplace",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = ConfigError;

    /// Accepts `UpdateAndAdd`, `update-and-add`, `update_and_add`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "updateandadd" => Ok(ImportMode::UpdateAndAdd),
            "addonly" => Ok(ImportMode::AddOnly),
            "dropandreplace" => Ok(ImportMode::DropAndReplace),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub mode: ImportMode,
    /// Data records read, valid or not.
    pub total: u64,
    /// Records whose entities were all resolved.
    pub processed: u64,
    /// Entities built new from the CSV.
    pub added: u64,
    /// Existing entities refreshed from the CSV (update mode only).
    pub updated: u64,
    pub skipped: u64,
    /// Batch windows that reached the store.
    pub flushes: usize,
    /// Entities the row-by-row fallback could not persist.
    pub failed_entities: usize,
    pub data_quality_warnings: usize,
}

// ============================================================================
// IMPORTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Streaming,
    Flushing,
    Draining,
    Done,
    Aborted,
}

pub struct Importer {
    mode: ImportMode,
    batch_size: usize,
    sink: Arc<dyn ImportSink>,
    cancel: CancellationToken,
    input_len: Option<u64>,
}

impl Importer {
    pub fn new(mode: ImportMode) -> Self {
        Importer {
            mode,
            batch_size: DEFAULT_BATCH_SIZE,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
            input_len: None,
        }
    }

    /// Rows per batch window. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ImportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Total input size in bytes; enables progress events.
    pub fn with_input_len(mut self, len: u64) -> Self {
        self.input_len = Some(len);
        self
    }

    pub fn mode(&self) -> ImportMode {
        self.mode
    }

    /// Run the whole import against `store`.
    ///
    /// Batches committed before a failure or cancellation stay committed.
    pub fn run<R: Read>(
        &self,
        store: &mut dyn RecordStore,
        input: R,
    ) -> Result<ImportSummary, ImportError> {
        self.run_with_len(store, input, self.input_len)
    }

    /// Import a CSV file; its size drives progress events.
    pub fn run_file(
        &self,
        store: &mut dyn RecordStore,
        path: &Path,
    ) -> Result<ImportSummary, ImportError> {
        let file = File::open(path).map_err(|err| ImportError::Read(err.into()))?;
        let len = file.metadata().ok().map(|meta| meta.len());
        self.run_with_len(store, file, len.or(self.input_len))
    }

    fn run_with_len<R: Read>(
        &self,
        store: &mut dyn RecordStore,
        input: R,
        input_len: Option<u64>,
    ) -> Result<ImportSummary, ImportError> {
        let mut run = Run {
            importer: self,
            input_len,
            summary: ImportSummary {
                run_id: Uuid::new_v4(),
                mode: self.mode,
                ..ImportSummary::default()
            },
            staging: StagingArea::new(),
            writer: Writer::new(self.mode.update_existing(), self.cancel.clone()),
            discarded: 0,
            bytes_read: 0,
        };

        let span = tracing::info_span!("import", run_id = %run.summary.run_id, mode = %self.mode);
        let _guard = span.enter();

        run.drive(store, input)
    }
}

/// Mutable state of one `Importer::run`.
struct Run<'a> {
    importer: &'a Importer,
    input_len: Option<u64>,
    summary: ImportSummary,
    staging: StagingArea,
    writer: Writer,
    discarded: usize,
    bytes_read: u64,
}

impl Run<'_> {
    fn drive<R: Read>(
        &mut self,
        store: &mut dyn RecordStore,
        input: R,
    ) -> Result<ImportSummary, ImportError> {
        let mut reader = csv_reader(input);
        let mut headers = ByteRecord::new();
        let mut record = ByteRecord::new();
        let mut state = State::Idle;

        loop {
            state = match state {
                State::Idle => {
                    if self.importer.cancel.is_cancelled() {
                        State::Aborted
                    } else {
                        if self.importer.mode == ImportMode::DropAndReplace {
                            reset_all(store).map_err(ImportError::Reset)?;
                        }
                        headers = reader.byte_headers().map_err(ImportError::Read)?.clone();
                        State::Streaming
                    }
                }

                State::Streaming => {
                    if self.importer.cancel.is_cancelled() {
                        State::Aborted
                    } else if !reader.read_byte_record(&mut record).map_err(ImportError::Read)? {
                        State::Draining
                    } else {
                        self.bytes_read = reader.position().byte();
                        self.summary.total += 1;
                        if self.handle_record(store, &record, &headers) {
                            State::Flushing
                        } else {
                            State::Streaming
                        }
                    }
                }

                State::Flushing => {
                    if self.flush(store)? {
                        State::Streaming
                    } else {
                        State::Aborted
                    }
                }

                State::Draining => {
                    if self.staging.is_empty() || self.flush(store)? {
                        State::Done
                    } else {
                        State::Aborted
                    }
                }

                State::Done => {
                    if self.input_len.is_some() {
                        self.emit(ImportEvent::Progress {
                            percent: 100,
                            message: "import complete".to_string(),
                        });
                    }
                    self.emit(ImportEvent::Completed {
                        summary: self.summary.clone(),
                    });
                    return Ok(self.summary.clone());
                }

                State::Aborted => {
                    let discarded = self.discarded + self.staging.len();
                    self.staging = StagingArea::new();
                    self.emit(ImportEvent::Cancelled {
                        discarded,
                        summary: self.summary.clone(),
                    });
                    return Err(ImportError::Cancelled {
                        summary: self.summary.clone(),
                    });
                }
            };
        }
    }

    /// Decode and reconcile one record. Returns true when a flush is due.
    fn handle_record(
        &mut self,
        store: &mut dyn RecordStore,
        record: &ByteRecord,
        headers: &ByteRecord,
    ) -> bool {
        let number = self.summary.total;

        let row: CsvRow = match record.deserialize(Some(headers)) {
            Ok(row) => row,
            Err(err) => {
                self.skip(number, None, format!("undecodable record: {err}"));
                return false;
            }
        };

        let checkpoint = self.staging.checkpoint();
        let update_existing = self.importer.mode.update_existing();
        let result = Reconciler::new(store, update_existing).reconcile_row(&row, &mut self.staging);

        match result {
            Ok(tally) => {
                self.summary.processed += 1;
                self.summary.added += tally.added as u64;
                self.summary.updated += tally.updated as u64;
                for warning in tally.warnings {
                    self.summary.data_quality_warnings += 1;
                    self.emit(ImportEvent::DataQuality {
                        record: number,
                        warning,
                    });
                }
                self.summary.processed % self.importer.batch_size as u64 == 0
            }
            Err(reason) => {
                // Quality warnings raised earlier in a skipped row are dropped with it.
                self.staging.rollback_to(checkpoint);
                self.skip(number, Some(reason.kind()), reason.to_string());
                false
            }
        }
    }

    fn skip(&mut self, record: u64, kind: Option<EntityKind>, reason: String) {
        self.summary.skipped += 1;
        self.emit(ImportEvent::RowSkipped {
            record,
            kind,
            reason,
        });
    }

    /// Hand the staged window to the writer. Returns false when the writer
    /// stopped because of cancellation.
    fn flush(&mut self, store: &mut dyn RecordStore) -> Result<bool, ImportError> {
        if self.staging.is_empty() {
            return Ok(true);
        }

        let mut batch = self.staging.take();
        let report = self
            .writer
            .flush(store, &mut batch)
            .map_err(|source| ImportError::Flush {
                committed_flushes: self.summary.flushes,
                source,
            })?;

        for failure in &report.failures {
            self.emit(ImportEvent::EntityFailed {
                failure: failure.clone(),
            });
        }
        self.summary.failed_entities += report.failures.len();

        if report.is_cancelled() {
            self.discarded += report.unwritten;
            return Ok(false);
        }

        self.summary.flushes += 1;
        self.emit(ImportEvent::BatchFlushed {
            flush: self.summary.flushes,
            processed: self.summary.processed,
            report,
        });

        if let Some(total) = self.input_len.filter(|len| *len > 0) {
            let percent = (self.bytes_read.saturating_mul(100) / total).min(100) as u8;
            self.emit(ImportEvent::Progress {
                percent,
                message: format!("processed {} of {} records", self.summary.processed, self.summary.total),
            });
        }

        Ok(true)
    }

    fn emit(&self, event: ImportEvent) {
        self.importer.sink.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::events::RecordingSink;
    use crate::store::{table_counts, TableCounts};
    use crate::testing::{csv_document, csv_line, distinct_rows, Fault, FaultyStore, CSV_HEADER};
    use crate::writer::Granularity;
    use std::io;

    fn recording_importer(mode: ImportMode) -> (Importer, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let importer = Importer::new(mode).with_sink(sink.clone());
        (importer, sink)
    }

    fn counts(store: &mut dyn RecordStore) -> TableCounts {
        table_counts(store).unwrap()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("UpdateAndAdd".parse::<ImportMode>().unwrap(), ImportMode::UpdateAndAdd);
        assert_eq!("add-only".parse::<ImportMode>().unwrap(), ImportMode::AddOnly);
        assert_eq!("drop_and_replace".parse::<ImportMode>().unwrap(), ImportMode::DropAndReplace);
        assert!("merge".parse::<ImportMode>().is_err());
    }

    #[test]
    fn test_two_rows_sharing_an_address() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let csv = csv_document(&[
            csv_line(1, 1001, 5001, None, "Active"),
            csv_line(1, 1002, 5002, None, "Active"),
        ]);

        let summary = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.added, 7);
        assert_eq!(summary.updated, 1);
        let c = counts(&mut store);
        assert_eq!((c.addresses, c.meters), (1, 2));
        let distinct_parents: i64 = store
            .connection()
            .query_row("SELECT COUNT(DISTINCT address_id) FROM meters", [], |r| r.get(0))
            .unwrap();
        assert_eq!(distinct_parents, 1);
    }

    #[test]
    fn test_update_and_add_is_idempotent_with_latest_values() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = csv_document(&[
            csv_line(1, 1001, 5001, Some(1), "Active"),
            csv_line(2, 2001, 6001, Some(2), "Active"),
        ]);
        let second = csv_document(&[
            csv_line(1, 1001, 5001, Some(1), "Retired"),
            csv_line(2, 2001, 6001, Some(2), "Retired"),
        ]);

        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, first.as_bytes())
            .unwrap();
        let after_first = counts(&mut store);
        let summary = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, second.as_bytes())
            .unwrap();

        assert_eq!(counts(&mut store), after_first);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.updated, 8);
        let status = store.address_by_icn(1).unwrap().unwrap().building_status;
        assert_eq!(status.as_deref(), Some("Retired"));
    }

    #[test]
    fn test_add_only_leaves_existing_values() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = csv_document(&[csv_line(1, 1001, 5001, None, "Active")]);
        let second = csv_document(&[csv_line(1, 1001, 5001, None, "Retired")]);

        Importer::new(ImportMode::AddOnly).run(&mut store, first.as_bytes()).unwrap();
        let summary = Importer::new(ImportMode::AddOnly)
            .run(&mut store, second.as_bytes())
            .unwrap();

        assert_eq!((summary.added, summary.updated), (0, 0));
        let status = store.address_by_icn(1).unwrap().unwrap().building_status;
        assert_eq!(status.as_deref(), Some("Active"));
    }

    #[test]
    fn test_location_dedup_without_icn() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let csv = format!(
            "{CSV_HEADER}\n\
             ,12 Elm St,Springfield,62701,Active,1001,Neptune,5/8in,5001,,crew\n\
             ,12 ELM ST,SPRINGFIELD,62701,Active,1002,Neptune,5/8in,5002,,crew\n"
        );

        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        assert_eq!(counts(&mut store).addresses, 1);
        assert_eq!(counts(&mut store).meters, 2);
    }

    #[test]
    fn test_meter_and_endpoint_dedup_in_run() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let csv = csv_document(&[
            csv_line(1, 1001, 5001, None, "Active"),
            csv_line(1, 1001, 5001, None, "Active"),
            csv_line(1, 1001, 5002, None, "Active"),
        ]);

        let summary = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        let c = counts(&mut store);
        assert_eq!((c.addresses, c.meters, c.endpoints, c.gis_records), (1, 1, 2, 2));
        assert_eq!(summary.processed, 3);
    }

    #[test]
    fn test_invalid_address_skips_whole_row() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);
        let csv = format!(
            "{CSV_HEADER}\n\
             7,,Springfield,62701,Active,1001,Neptune,5/8in,5001,1,crew\n"
        );

        let summary = importer.run(&mut store, csv.as_bytes()).unwrap();

        assert_eq!((summary.total, summary.processed, summary.skipped), (1, 0, 1));
        assert_eq!(counts(&mut store), TableCounts::default());
        assert_eq!(sink.flush_count(), 0);
        assert!(sink.skipped()[0].1.contains("Location_Address_Line1"));
    }

    #[test]
    fn test_invalid_endpoint_discards_staged_parents() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let csv = format!(
            "{CSV_HEADER}\n\
             1,1 Elm St,Springfield,62701,Active,1001,Neptune,5/8in,EP-1,,crew\n\
             2,2 Elm St,Springfield,62701,Active,2001,Neptune,5/8in,6001,,crew\n"
        );

        let summary = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        assert_eq!((summary.processed, summary.skipped, summary.added), (1, 1, 4));
        assert_eq!(counts(&mut store).addresses, 1);
        assert!(store.address_by_icn(1).unwrap().is_none());
    }

    #[test]
    fn test_batch_boundary_500_rows_one_flush() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);

        importer.run(&mut store, distinct_rows(500).as_bytes()).unwrap();

        assert_eq!(sink.flush_count(), 1);
        assert_eq!(counts(&mut store).gis_records, 500);
    }

    #[test]
    fn test_batch_boundary_501_rows_two_flushes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);

        let summary = importer.run(&mut store, distinct_rows(501).as_bytes()).unwrap();

        assert_eq!(sink.flush_count(), 2);
        assert_eq!(summary.flushes, 2);
        assert_eq!(counts(&mut store).addresses, 501);
    }

    #[test]
    fn test_duplicate_key_on_commit_recovers_row_by_row() {
        let mut store = FaultyStore::new(SqliteStore::open_in_memory().unwrap());
        store.inject(Fault::UniqueOnCommit);
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);

        let summary = importer.run(&mut store, distinct_rows(3).as_bytes()).unwrap();

        assert_eq!(summary.failed_entities, 0);
        assert_eq!(counts(&mut store).meters, 3);
        let granularity = sink.events().into_iter().find_map(|e| match e {
            ImportEvent::BatchFlushed { report, .. } => Some(report.granularity),
            _ => None,
        });
        assert_eq!(granularity, Some(Granularity::RowByRow));
    }

    #[test]
    fn test_drop_and_replace_keeps_only_current_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, distinct_rows(4).as_bytes())
            .unwrap();

        let csv = csv_document(&[csv_line(9, 9001, 9501, Some(99), "Active")]);
        Importer::new(ImportMode::DropAndReplace)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        let c = counts(&mut store);
        assert_eq!((c.addresses, c.meters, c.endpoints, c.gis_records), (1, 1, 1, 1));
        assert_eq!(store.address_by_icn(9).unwrap().and_then(|a| a.id), Some(1));
    }

    #[test]
    fn test_failed_reset_aborts_before_reading() {
        let mut store = FaultyStore::new(SqliteStore::open_in_memory().unwrap());
        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, distinct_rows(2).as_bytes())
            .unwrap();
        store.inject(Fault::ClearFails(EntityKind::Address));

        let err = Importer::new(ImportMode::DropAndReplace)
            .run(&mut store, distinct_rows(5).as_bytes())
            .unwrap_err();

        assert!(matches!(err, ImportError::Reset(_)));
        assert_eq!(counts(&mut store).addresses, 2);
    }

    #[test]
    fn test_store_failure_stops_import_but_keeps_committed_batches() {
        let mut store = FaultyStore::new(SqliteStore::open_in_memory().unwrap());
        Importer::new(ImportMode::UpdateAndAdd)
            .with_batch_size(2)
            .run(&mut store, distinct_rows(2).as_bytes())
            .unwrap();
        store.inject(Fault::InsertFails(EntityKind::GisRecord));

        let err = Importer::new(ImportMode::UpdateAndAdd)
            .with_batch_size(2)
            .run(&mut store, distinct_rows(4).as_bytes())
            .unwrap_err();

        assert!(matches!(err, ImportError::Flush { committed_flushes: 1, .. }));
        assert_eq!(counts(&mut store).addresses, 2);
    }

    #[test]
    fn test_lookup_failure_skips_only_that_row() {
        let mut store = FaultyStore::new(SqliteStore::open_in_memory().unwrap());
        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv_document(&[csv_line(1, 1001, 5001, Some(1), "Active")]).as_bytes())
            .unwrap();
        store.inject(Fault::LookupFailsOnce(EntityKind::Meter));
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);
        let csv = csv_document(&[
            csv_line(1, 1001, 5001, Some(1), "Retired"),
            csv_line(2, 2001, 6001, Some(2), "Active"),
            csv_line(3, 3001, 7001, Some(3), "Active"),
        ]);

        let summary = importer.run(&mut store, csv.as_bytes()).unwrap();

        assert_eq!((summary.total, summary.processed, summary.skipped), (3, 2, 1));
        assert!(sink.events().iter().any(|e| matches!(
            e,
            ImportEvent::RowSkipped {
                record: 1,
                kind: Some(EntityKind::Meter),
                ..
            }
        )));
        // The staged address refresh from the failed row never reached the store.
        let status = store.address_by_icn(1).unwrap().unwrap().building_status;
        assert_eq!(status.as_deref(), Some("Active"));
        let c = counts(&mut store);
        assert_eq!((c.addresses, c.meters, c.endpoints, c.gis_records), (3, 3, 3, 3));
    }

    #[test]
    fn test_cancelled_drop_and_replace_keeps_existing_data() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, distinct_rows(3).as_bytes())
            .unwrap();
        let before = counts(&mut store);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Importer::new(ImportMode::DropAndReplace)
            .with_cancellation(cancel)
            .run(&mut store, distinct_rows(1).as_bytes())
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(counts(&mut store), before);
        assert_eq!(before.addresses, 3);
    }

    #[test]
    fn test_cancelled_before_start_reads_nothing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Importer::new(ImportMode::UpdateAndAdd)
            .with_cancellation(cancel)
            .run(&mut store, distinct_rows(3).as_bytes())
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(counts(&mut store), TableCounts::default());
    }

    /// Cancels the run as soon as the first batch is committed.
    struct CancelAfterFirstFlush {
        cancel: CancellationToken,
        inner: RecordingSink,
    }

    impl ImportSink for CancelAfterFirstFlush {
        fn emit(&self, event: &ImportEvent) {
            if matches!(event, ImportEvent::BatchFlushed { .. }) {
                self.cancel.cancel();
            }
            self.inner.emit(event);
        }
    }

    #[test]
    fn test_cancel_mid_run_keeps_committed_batch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        let sink = Arc::new(CancelAfterFirstFlush {
            cancel: cancel.clone(),
            inner: RecordingSink::new(),
        });

        let err = Importer::new(ImportMode::UpdateAndAdd)
            .with_batch_size(2)
            .with_sink(sink.clone())
            .with_cancellation(cancel)
            .run(&mut store, distinct_rows(5).as_bytes())
            .unwrap_err();

        match err {
            ImportError::Cancelled { summary } => assert_eq!(summary.processed, 2),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(counts(&mut store).addresses, 2);
        assert!(sink
            .inner
            .events()
            .iter()
            .any(|e| matches!(e, ImportEvent::Cancelled { discarded: 0, .. })));
    }

    #[test]
    fn test_undecodable_record_is_skipped() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut bytes = format!("{CSV_HEADER}\n").into_bytes();
        bytes.extend_from_slice(b"1,\xff\xfe Elm St,Springfield,62701,Active,1001,Neptune,5/8in,5001,,crew\n");
        bytes.extend_from_slice(csv_line(2, 2001, 6001, None, "Active").as_bytes());
        bytes.push(b'\n');

        let summary = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, bytes.as_slice())
            .unwrap();

        assert_eq!((summary.total, summary.processed, summary.skipped), (2, 1, 1));
    }

    #[test]
    fn test_run_file_reports_progress() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        io::Write::write_all(&mut file, distinct_rows(3).as_bytes()).unwrap();
        let (importer, sink) = recording_importer(ImportMode::AddOnly);

        let summary = importer.run_file(&mut store, file.path()).unwrap();

        assert_eq!(summary.added, 12);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, ImportEvent::Progress { percent: 100, .. })));
    }

    #[test]
    fn test_missing_file_is_read_failure() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = Importer::new(ImportMode::AddOnly)
            .run_file(&mut store, &dir.path().join("absent.csv"))
            .unwrap_err();

        assert!(matches!(err, ImportError::Read(_)));
    }

    struct BrokenReader {
        served: bool,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("connection reset"));
            }
            self.served = true;
            let header = format!("{CSV_HEADER}\n");
            let n = header.len().min(buf.len());
            buf[..n].copy_from_slice(&header.as_bytes()[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_reader_failure_is_pipeline_failure() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let err = Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, BrokenReader { served: false })
            .unwrap_err();

        assert!(matches!(err, ImportError::Read(_)));
    }

    #[test]
    fn test_progress_reaches_100_when_length_known() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let csv = distinct_rows(4);
        let sink = Arc::new(RecordingSink::new());

        Importer::new(ImportMode::UpdateAndAdd)
            .with_batch_size(2)
            .with_sink(sink.clone())
            .with_input_len(csv.len() as u64)
            .run(&mut store, csv.as_bytes())
            .unwrap();

        let percents: Vec<u8> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents.len(), 3);
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_icn_mismatch_on_location_match_is_reported() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        Importer::new(ImportMode::UpdateAndAdd)
            .run(&mut store, csv_document(&[csv_line(1, 1001, 5001, None, "Active")]).as_bytes())
            .unwrap();
        let (importer, sink) = recording_importer(ImportMode::UpdateAndAdd);
        let csv = format!(
            "{CSV_HEADER}\n\
             77,1 Elm St,Springfield,62701,Active,1001,Neptune,5/8in,5001,,crew\n"
        );

        let summary = importer.run(&mut store, csv.as_bytes()).unwrap();

        assert_eq!(summary.data_quality_warnings, 1);
        assert_eq!(counts(&mut store).addresses, 1);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, ImportEvent::DataQuality { record: 1, .. })));
    }
}
