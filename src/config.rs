// ⚙️ Configuration - environment settings and upload constraints
//
// Values come from the process environment, with a `.env` file loaded first
// when present. CLI flags override them in the binaries.

use crate::error::{ConfigError, UploadError};
use crate::import::DEFAULT_BATCH_SIZE;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_PATH: &str = "changeout.db";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub database_path: PathBuf,
    pub batch_size: usize,
    pub max_upload_bytes: u64,
    pub server_addr: String,
    pub logs_dir: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
        }
    }
}

impl ImportConfig {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = ImportConfig::default();

        if let Some(path) = get("IMPORT_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(raw) = get("IMPORT_BATCH_SIZE") {
            config.batch_size = positive("IMPORT_BATCH_SIZE", &raw)? as usize;
        }
        if let Some(raw) = get("IMPORT_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = positive("IMPORT_MAX_UPLOAD_BYTES", &raw)?;
        }
        if let Some(addr) = get("SERVER_ADDR") {
            config.server_addr = addr;
        }
        if let Some(dir) = get("LOGS_DIR") {
            config.logs_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::NotPositive {
            key,
            value: raw.to_string(),
        }),
    }
}

// ============================================================================
// UPLOAD CONSTRAINTS
// ============================================================================

/// Check an upload before any of it is imported.
pub fn validate_upload(file_name: &str, size: u64, limit: u64) -> Result<(), UploadError> {
    let is_csv = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if !is_csv {
        return Err(UploadError::NotCsv(file_name.to_string()));
    }
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > limit {
        return Err(UploadError::TooLarge { size, limit });
    }
    Ok(())
}
