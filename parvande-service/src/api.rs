//! HTTP API for the Parvande archive service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Persons and their folder hierarchy
//! - Document upload, content and original file access
//! - Synchronous single-file text extraction
//! - Search, queue status and settings

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{I18nError, ServiceError};
use crate::service::{ArchiveService, QueueOverview};

pub mod documents;
pub mod extract;
pub mod folders;
pub mod persons;
pub mod search;
pub mod settings;
use documents::{
    get_document_file_handler, get_document_handler, requeue_document_handler,
    upload_documents_handler,
};
use extract::extract_text_handler;
use folders::{
    create_folder_handler, folder_contents_handler, folder_tree_handler, root_contents_handler,
};
use persons::{create_person_handler, get_person_handler, list_persons_handler};
use search::search_handler;
use settings::{get_settings_handler, update_settings_handler};

/// Files accepted in a single upload request
const MAX_FILES_PER_UPLOAD: usize = 10;
/// Allowance for multipart framing and text fields
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<ArchiveService>,
    pub start_time: Instant,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), self.service.locale())
    }

    pub fn invalid_request(&self, message: impl ToString) -> I18nError {
        self.i18n_error(ServiceError::InvalidRequest {
            message: message.to_string(),
        })
    }
}

/// Build the API router
pub fn router(service: Arc<ArchiveService>, metrics: PrometheusHandle) -> Router {
    // Use the configured max document size for uploads
    let max_document_size = service
        .runtime_config
        .dynamic()
        .limits
        .max_document_size_bytes as usize;
    let single_file_limit = max_document_size.saturating_add(MULTIPART_OVERHEAD);
    let batch_limit = max_document_size
        .saturating_mul(MAX_FILES_PER_UPLOAD)
        .saturating_add(MULTIPART_OVERHEAD);

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Person endpoints
        .route(
            "/persons",
            get(list_persons_handler).post(create_person_handler),
        )
        .route("/persons/{id}", get(get_person_handler))
        .route(
            "/persons/{id}/documents",
            post(upload_documents_handler).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route(
            "/persons/{id}/folders",
            get(folder_tree_handler).post(create_folder_handler),
        )
        .route("/persons/{id}/root", get(root_contents_handler))
        // Folder endpoints
        .route("/folders/{id}/contents", get(folder_contents_handler))
        // Document endpoints
        .route("/documents/{id}", get(get_document_handler))
        .route("/documents/{id}/file", get(get_document_file_handler))
        .route("/documents/{id}/requeue", post(requeue_document_handler))
        // Inline extraction, bypassing the queue
        .route(
            "/extract-text",
            post(extract_text_handler).layer(DefaultBodyLimit::max(single_file_limit)),
        )
        // Search and queue
        .route("/search", get(search_handler))
        .route("/queue", get(queue_handler))
        // Settings endpoints
        .route(
            "/settings",
            get(get_settings_handler).put(update_settings_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let i18n = &state.service.i18n;
    let locale = state.service.locale();
    let engine = state.service.ocr.engine();

    let status = match engine.unavailable_reason() {
        None => i18n.get(locale, "health-status-healthy", None),
        Some(reason) => i18n.format(locale, "health-status-degraded", &[("reason", reason)]),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        engine_available: engine.is_available(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    engine_available: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

// === Queue ===

async fn queue_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueOverview>, I18nError> {
    let overview = state
        .service
        .queue_overview()
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(overview))
}
