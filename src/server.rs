//! JSON HTTP API for the resolution engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/resolve` | Resolve a raw scan input |
//! | `POST` | `/confirm` | Record a human-confirmed selection |
//! | `GET`  | `/corrections/{key}` | List corrections for a normalized key |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "input must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based scanning
//! clients can call the API directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::{CatalogClient, HttpCatalogClient};
use crate::config::Config;
use crate::corrections;
use crate::db;
use crate::diagnostics::DiagnosticsReport;
use crate::migrate;
use crate::models::{
    CorrectionRecord, PublisherFilter, Resolution, ScanContext, ScanFormat, SelectedItem,
};
use crate::resolve::{self, ResolveOptions};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
}

/// Start the HTTP API on the configured bind address.
///
/// Constructs the real HTTP catalog client — a missing API credential fails
/// here, at startup, rather than on the first request.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(&config.catalog)?);
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    run_server_with_catalog(config, pool, catalog).await
}

/// Start the server with an externally supplied catalog client and pool.
/// Used by tests to substitute a mock catalog.
pub async fn run_server_with_catalog(
    config: &Config,
    pool: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(config, pool, catalog);

    println!("scan-resolver API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router without binding a socket, so request handling can be
/// exercised directly.
pub fn build_router(
    config: &Config,
    pool: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        catalog,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/resolve", post(handle_resolve))
        .route("/confirm", post(handle_confirm))
        .route("/corrections/{key}", get(handle_corrections))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ /resolve ============

#[derive(Deserialize)]
struct ResolveRequest {
    input: String,
    #[serde(default)]
    publisher_hint: Option<String>,
    /// Session publisher filter: `marvel`, `dc`, or `indie`.
    #[serde(default)]
    filter: Option<String>,
    /// Packaging format: `raw` or `slab`.
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    reported_wrong_source_id: Option<String>,
    /// When true, the response carries the full scored/rejected candidate
    /// list. Off by default; safe to omit in production.
    #[serde(default)]
    diagnostics: bool,
}

#[derive(Serialize)]
struct ResolveResponse {
    resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<DiagnosticsReport>,
}

async fn handle_resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    if req.input.trim().is_empty() {
        return Err(bad_request("input must not be empty"));
    }

    let publisher_filter = req
        .filter
        .as_deref()
        .map(PublisherFilter::parse)
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;
    let format = req
        .format
        .as_deref()
        .map(ScanFormat::parse)
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?
        .unwrap_or_default();

    let options = ResolveOptions {
        publisher_hint: req.publisher_hint,
        context: ScanContext {
            publisher_filter,
            format,
        },
        reported_wrong_source_id: req.reported_wrong_source_id,
        diagnostics: req.diagnostics,
    };

    let outcome = resolve::resolve_scan(
        &state.pool,
        Arc::clone(&state.catalog),
        &state.config,
        &req.input,
        &options,
    )
    .await;

    Ok(Json(ResolveResponse {
        resolution: outcome.resolution,
        diagnostics: outcome.diagnostics,
    }))
}

// ============ /confirm ============

#[derive(Deserialize)]
struct ConfirmRequest {
    input: String,
    selection: SelectedItem,
    #[serde(default)]
    original_confidence: f64,
}

async fn handle_confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Resolution>, AppError> {
    if req.input.trim().is_empty() {
        return Err(bad_request("input must not be empty"));
    }

    let resolution = resolve::confirm_selection(
        &state.pool,
        &req.input,
        req.selection,
        req.original_confidence,
    )
    .await;

    Ok(Json(resolution))
}

// ============ /corrections/{key} ============

async fn handle_corrections(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<CorrectionRecord>>, AppError> {
    let records = corrections::list(&state.pool, Some(&key), 50)
        .await
        .map_err(|e| internal(e.to_string()))?;

    if records.is_empty() {
        return Err(not_found(format!("no corrections for key: {}", key)));
    }

    Ok(Json(records))
}

// ============ /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
