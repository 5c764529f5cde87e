// Change-out Import CLI
// `import` loads a CSV into the store, `counts` shows what is there

use anyhow::{Context, Result};
use changeout_import::logging::init_logging;
use changeout_import::{
    table_counts, validate_upload, ImportConfig, ImportMode, ImportSummary, Importer, SqliteStore,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "changeout-import", about = "Import meter change-out CSV files into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a change-out CSV file
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// UpdateAndAdd, AddOnly or DropAndReplace
        #[arg(long, default_value = "UpdateAndAdd")]
        mode: ImportMode,
        /// SQLite database path (overrides IMPORT_DATABASE_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Rows per batch (overrides IMPORT_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print row counts per table
    Counts {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ImportConfig::from_env().context("Invalid configuration")?;
    let _guard = init_logging(&config.logs_dir, "changeout-import.log");

    match cli.command {
        Command::Import {
            file,
            mode,
            db,
            batch_size,
        } => {
            let db_path = db.unwrap_or_else(|| config.database_path.clone());
            let batch_size = batch_size.unwrap_or(config.batch_size);
            run_import(&file, mode, &db_path, batch_size, config.max_upload_bytes)
        }
        Command::Counts { db } => {
            let db_path = db.unwrap_or_else(|| config.database_path.clone());
            run_counts(&db_path)
        }
    }
}

fn run_import(file: &Path, mode: ImportMode, db_path: &Path, batch_size: usize, limit: u64) -> Result<()> {
    println!("🗄️  Change-out import ({mode}) - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let size = std::fs::metadata(file)
        .with_context(|| format!("Cannot read {}", file.display()))?
        .len();
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    validate_upload(&file_name, size, limit)?;

    let mut store = SqliteStore::open(db_path)?;
    println!("✓ Database ready at {}", db_path.display());

    let summary = Importer::new(mode)
        .with_batch_size(batch_size)
        .run_file(&mut store, file)
        .with_context(|| format!("Import of {} failed", file.display()))?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete (run {})", summary.run_id);
    println!("   Records:   {} read, {} processed, {} skipped", summary.total, summary.processed, summary.skipped);
    println!("   Entities:  {} added, {} updated", summary.added, summary.updated);
    println!("   Batches:   {}", summary.flushes);
    if summary.failed_entities > 0 {
        println!("⚠️  {} entities could not be written", summary.failed_entities);
    }
    if summary.data_quality_warnings > 0 {
        println!(
            "⚠️  {} addresses matched by street/city/zip with a different ICN",
            summary.data_quality_warnings
        );
    }
}

fn run_counts(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        anyhow::bail!("Database not found at {}. Run `changeout-import import <FILE>` first.", db_path.display());
    }

    let mut store = SqliteStore::open(db_path)?;
    let counts = table_counts(&mut store)?;

    println!("📊 {}", db_path.display());
    println!("   addresses:   {}", counts.addresses);
    println!("   meters:      {}", counts.meters);
    println!("   endpoints:   {}", counts.endpoints);
    println!("   gis_records: {}", counts.gis_records);
    Ok(())
}
