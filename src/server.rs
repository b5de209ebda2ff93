//! HTTP API for the comparison engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/compare` | Run (or serve from cache) one comparison |
//! | `DELETE` | `/cache/categories/{category_id}` | Invalidate a category's cached comparisons |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "at least one criterion is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (408), `internal` (500),
//! `catalog_unavailable` (503).
//!
//! # Cancellation
//!
//! Each comparison gets a `CancellationToken`. It is cancelled when the
//! request exceeds `[server].request_timeout_ms` or when the handler future
//! is dropped because the client went away.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use pareto_core::error::CompareError;
use pareto_core::models::ComparisonRequest;

use crate::compare::{validate_category_id, Comparator, ComparisonResponse};
use crate::config::Config;
use crate::sqlite_catalog;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    comparator: Arc<Comparator>,
    request_timeout: Duration,
}

/// Builds the router. Exposed separately from [`serve`] so tests can mount
/// it over an in-memory catalog.
pub fn router(comparator: Arc<Comparator>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        comparator,
        request_timeout,
    };

    Router::new()
        .route("/compare", post(handle_compare))
        .route("/cache/categories/{category_id}", delete(handle_invalidate))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serves on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    comparator: Arc<Comparator>,
    request_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(comparator, request_timeout);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Starts the server against the SQLite catalog, as used by `pareto serve`.
///
/// Binds to `[server].bind`, shuts down on Ctrl-C, and flushes the
/// comparison cache on the way out.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog = sqlite_catalog::open(config).await?;
    let comparator = Arc::new(Comparator::from_config(config, Arc::new(catalog)));

    let listener = TcpListener::bind(&config.server.bind).await?;
    println!("Comparison server listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, "server started");

    serve(
        listener,
        comparator.clone(),
        config.server.request_timeout(),
        shutdown_signal(),
    )
    .await?;

    match comparator.cache().flush().await {
        Ok(()) => tracing::info!("comparison cache flushed"),
        Err(e) => tracing::warn!(error = %e, "failed to flush comparison cache"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
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

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<CompareError> for AppError {
    fn from(err: CompareError) -> Self {
        let message = err.to_string();
        match err {
            CompareError::InvalidRequest(_) => bad_request(message),
            CompareError::CatalogUnavailable(_) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: err.code().to_string(),
                message,
            },
            CompareError::ComputationCancelled(_) => timeout_error(message),
            CompareError::CacheUnavailable(_) | CompareError::Internal(_) => {
                internal_error(message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /compare ============

async fn handle_compare(
    State(state): State<AppState>,
    payload: Result<Json<ComparisonRequest>, JsonRejection>,
) -> Result<Json<ComparisonResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    let cancel = CancellationToken::new();
    // Cancels the token if this handler is dropped (client disconnect).
    let _disconnect = cancel.clone().drop_guard();

    let comparison = state.comparator.compare(&request, &cancel);
    match tokio::time::timeout(state.request_timeout, comparison).await {
        Ok(result) => Ok(Json(result?)),
        Err(_) => {
            cancel.cancel();
            Err(timeout_error(format!(
                "comparison exceeded {} ms",
                state.request_timeout.as_millis()
            )))
        }
    }
}

// ============ DELETE /cache/categories/{category_id} ============

#[derive(Serialize)]
struct InvalidateResponse {
    invalidated: u64,
}

async fn handle_invalidate(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<Json<InvalidateResponse>, AppError> {
    validate_category_id(&category_id)?;

    let invalidated = state
        .comparator
        .cache()
        .invalidate_category(&category_id)
        .await
        .map_err(|e| {
            tracing::warn!(category = %category_id, error = %e, "cache invalidation failed");
            internal_error(format!("cache invalidation failed: {}", e))
        })?;

    Ok(Json(InvalidateResponse { invalidated }))
}
