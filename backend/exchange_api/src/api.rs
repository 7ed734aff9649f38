//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use validator::Validate;

use crate::db;
use crate::errors::Result;
use crate::intake::{self, AcceptedExchange};
use crate::records::{
    ExchangeCreated, ExchangeRecord, ExchangeStatus, NewExchange, StoredFile, TaskSummary,
};
use crate::storage::UploadStore;

/// Creation route, relative to the server root.
pub const CREATE_EXCHANGE_PATH: &str = "/api/student/exchanges/productforproductexchange";

/// Upper bound on file parts in one creation request, used to size the body
/// limit: two banners, six images and the attachments of both sides.
const MAX_FILE_PARTS: u64 = 32;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub store: UploadStore,
    pub max_upload_bytes: u64,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    pub id: i64,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub status: Option<ExchangeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTaskRequest {
    pub id: i64,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub id: i64,
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ─────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────

pub fn router(state: Arc<ApiState>) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes.saturating_mul(MAX_FILE_PARTS))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health))
        .route(CREATE_EXCHANGE_PATH, post(create_exchange))
        .route(
            "/tasks",
            get(list_tasks).put(update_task).delete(delete_task),
        )
        .route("/exchanges/:id", get(get_exchange))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/student/exchanges/productforproductexchange`
///
/// Accepts the offered and expected sides of an exchange as one multipart
/// body, stores the referenced files and persists both records.
pub async fn create_exchange(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ExchangeCreated>)> {
    let intake = intake::read_multipart(multipart).await?;
    let accepted = intake
        .accept(state.store.layout(), state.max_upload_bytes)
        .inspect_err(|e| warn!("Exchange rejected: {e}"))?;

    let stored = store_files(&state.store, &accepted).await;
    let files = match stored {
        Ok(files) => files,
        Err((written, e)) => {
            discard_unreferenced(&state, &written).await;
            return Err(e);
        }
    };

    let new = NewExchange {
        offered: accepted.offered,
        expected: accepted.expected,
        files,
        created_at: chrono::Utc::now().timestamp(),
    };
    match db::insert_exchange(&state.pool, &new).await {
        Ok(created) => {
            info!(id = created.id, title = %new.name(), "exchange created");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            let written: Vec<String> = new.files.into_iter().map(|f| f.path).collect();
            discard_unreferenced(&state, &written).await;
            Err(e)
        }
    }
}

/// Write every accepted upload. On failure, returns what was already written.
async fn store_files(
    store: &UploadStore,
    accepted: &AcceptedExchange,
) -> std::result::Result<Vec<StoredFile>, (Vec<String>, crate::errors::ApiError)> {
    let mut stored = Vec::with_capacity(accepted.files.len());
    for upload in &accepted.files {
        let file = &upload.file;
        match store.save(upload.kind, &file.name, &file.bytes).await {
            Ok(path) => stored.push(StoredFile::new(
                upload.side,
                upload.kind,
                path,
                &file.mime_type,
                file.size,
            )),
            Err(e) => return Err((stored.into_iter().map(|f| f.path).collect(), e)),
        }
    }
    Ok(stored)
}

async fn discard(store: &UploadStore, paths: &[String]) {
    for path in paths {
        store.remove(path).await;
    }
}

/// Remove files written for a failed creation, keeping those another
/// exchange still references.
async fn discard_unreferenced(state: &ApiState, written: &[String]) {
    match db::unreferenced_paths(&state.pool, written).await {
        Ok(paths) => discard(&state.store, &paths).await,
        Err(e) => warn!("Keeping {} uploads, reference check failed: {e}", written.len()),
    }
}

/// `GET /tasks`
///
/// Returns a summary of every exchange, newest first.
pub async fn list_tasks(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<TaskSummary>>> {
    Ok(Json(db::list_tasks(&state.pool).await?))
}

/// `PUT /tasks`
///
/// Renames an exchange and/or changes its status. The name is the offered
/// title, so a rename updates the stored offered record too.
pub async fn update_task(
    State(state): State<Arc<ApiState>>,
    Json(mut body): Json<UpdateTaskRequest>,
) -> Result<Json<TaskSummary>> {
    body.name = body.name.map(|name| name.trim().to_string());
    body.validate()?;
    let task = db::update_task(&state.pool, body.id, body.name.as_deref(), body.status).await?;
    info!(id = task.id, status = %task.status, "task updated");
    Ok(Json(task))
}

/// `DELETE /tasks`
///
/// Deletes an exchange and the stored files no other exchange references.
pub async fn delete_task(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<DeleteTaskRequest>,
) -> Result<Json<DeletedResponse>> {
    let paths = db::delete_task(&state.pool, body.id).await?;
    discard(&state.store, &paths).await;
    Ok(Json(DeletedResponse {
        id: body.id,
        deleted: true,
    }))
}

/// `GET /exchanges/:id`
///
/// Returns both persisted records of one exchange.
pub async fn get_exchange(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<ExchangeRecord>> {
    Ok(Json(db::get_exchange(&state.pool, id).await?))
}
