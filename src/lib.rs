// Change-out Import - Core Library
// Exposes the CSV import pipeline for the CLI, the API server, and tests

pub mod config;         // Environment settings + upload constraints
pub mod db;             // SQLite schema + RecordStore implementation
pub mod entities;       // Address / Meter / Endpoint / GIS record models
pub mod error;
pub mod events;         // Import events + sinks
pub mod import;         // Batch coordinator
pub mod logging;        // Subscriber setup for the binaries
pub mod parser;         // CSV row shape + tolerant cell parsers
pub mod reconciliation; // Per-row entity resolution
pub mod reset;          // DropAndReplace table reset
pub mod schema;         // Required-field validation
pub mod staging;        // In-batch arenas
pub mod store;          // RecordStore trait
pub mod writer;         // Transactional writer

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{validate_upload, ImportConfig};
pub use db::{setup_database, SqliteStore};
pub use entities::{Address, Endpoint, EntityKind, GisRecord, Meter, ParentRef};
pub use error::{ConfigError, ImportError, StoreError, StoreResult, UploadError};
pub use events::{ImportEvent, ImportSink, RecordingSink, TracingSink};
pub use import::{ImportMode, ImportSummary, Importer, DEFAULT_BATCH_SIZE};
pub use parser::CsvRow;
pub use reset::reset_all;
pub use store::{table_counts, RecordStore, TableCounts};
pub use writer::{FlushReport, Granularity};
