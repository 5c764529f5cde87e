// Change-out Import - Web Server
// REST upload endpoint with Axum

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use changeout_import::logging::init_logging;
use changeout_import::{
    table_counts, validate_upload, ImportConfig, ImportError, ImportMode, ImportSummary, Importer,
    SqliteStore, TableCounts,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    config: Arc<ImportConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response()
    }

    fn fail(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Response {
        let body = Self {
            success: false,
            data,
            error: Some(message.into()),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    counts: TableCounts,
}

#[derive(Deserialize)]
struct ImportParams {
    file_name: String,
    mode: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health
async fn health_check(State(state): State<AppState>) -> Response {
    let counts = tokio::task::spawn_blocking(move || {
        let mut store = match state.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        table_counts(&mut *store)
    })
    .await;

    match counts {
        Ok(Ok(counts)) => ApiResponse::ok(HealthResponse { status: "ok", counts }),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "health check query failed");
            ApiResponse::<()>::fail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
        }
        Err(join_err) => {
            ApiResponse::<()>::fail(StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string(), None)
        }
    }
}

/// POST /api/import/csv?file_name=..&mode=..
///
/// The body is the raw CSV. Dropping this future (client gone) cancels the run.
async fn import_csv(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> Response {
    if let Err(err) = validate_upload(&params.file_name, body.len() as u64, state.config.max_upload_bytes) {
        return ApiResponse::<()>::fail(StatusCode::BAD_REQUEST, err.to_string(), None);
    }

    let mode = match params.mode.as_deref().map(str::parse::<ImportMode>).transpose() {
        Ok(mode) => mode.unwrap_or_default(),
        Err(err) => return ApiResponse::<()>::fail(StatusCode::BAD_REQUEST, err.to_string(), None),
    };

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let importer = Importer::new(mode)
        .with_batch_size(state.config.batch_size)
        .with_cancellation(cancel)
        .with_input_len(body.len() as u64);
    tracing::info!(file_name = %params.file_name, %mode, bytes = body.len(), "import requested");

    let outcome = tokio::task::spawn_blocking(move || {
        let mut store = match state.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        importer.run(&mut *store, body.as_ref())
    })
    .await;

    match outcome {
        Ok(Ok(summary)) => ApiResponse::ok(summary),
        Ok(Err(ImportError::Cancelled { summary })) => ApiResponse::<ImportSummary>::fail(
            StatusCode::SERVICE_UNAVAILABLE,
            "import cancelled",
            Some(summary),
        ),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "import failed");
            ApiResponse::<()>::fail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
        }
        Err(join_err) => {
            ApiResponse::<()>::fail(StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string(), None)
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = ImportConfig::from_env().context("Invalid configuration")?;
    let _guard = init_logging(&config.logs_dir, "changeout-server.log");

    println!("🌐 Change-out Import - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = SqliteStore::open(&config.database_path)?;
    println!("✓ Database opened: {:?}", config.database_path);

    let body_limit = usize::try_from(config.max_upload_bytes).unwrap_or(usize::MAX);
    let addr = config.server_addr.clone();
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/import/csv", post(import_csv))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(body_limit)),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    println!("\n🚀 Server running on http://{addr}");
    println!("   Upload: POST http://{addr}/api/import/csv?file_name=changeouts.csv");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server stopped")?;
    Ok(())
}
