// 📜 Logging - stdout plus a daily rolling file

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "info,changeout_import=debug";

/// Install the global subscriber. Keep the returned guard alive until exit or
/// buffered file output is lost.
pub fn init_logging(logs_dir: &Path, file_name: &str) -> WorkerGuard {
    if let Err(err) = std::fs::create_dir_all(logs_dir) {
        eprintln!("⚠️  Could not create {}: {err}", logs_dir.display());
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        ) // file
        .init();

    guard
}
