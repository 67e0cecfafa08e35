use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::{
    aggregate::top_plants,
    dataset::DatasetCache,
    domain::PlantAggregate,
    error::ServiceError,
    normalize::{normalize, to_compact_csv},
    reader::{decode, FileFormat},
    store::BlobStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub cache: Arc<DatasetCache>,
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UploadResponse {
    pub filename: String,
    pub status: String,
    pub records_count: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/power-plants/upload", post(upload))
        .route("/api/power-plants/states", get(states))
        .route("/api/power-plants", get(plants))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Cleans one uploaded file and persists it as a compact canonical CSV blob
/// named `cleaned_<stem>.csv`. Rejections leave the store and caches
/// untouched.
pub async fn ingest_file(
    store: &dyn BlobStore,
    cache: &DatasetCache,
    file_name: &str,
    bytes: Bytes,
) -> Result<UploadResponse, ServiceError> {
    let format = FileFormat::from_name(file_name)?;
    let table = decode(&bytes, format)?;
    let batch = normalize(table)?;

    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
    let stored_name = format!("cleaned_{stem}.csv");

    store
        .put_blob(&stored_name, Bytes::from(to_compact_csv(&batch.records)))
        .await?;
    cache.invalidate_states().await;

    metrics::counter!("upload_accepted_total").increment(1);
    tracing::info!(
        file = %stored_name,
        records = batch.records.len(),
        dropped = batch.dropped_rows,
        "stored cleaned upload"
    );

    Ok(UploadResponse {
        filename: stored_name,
        status: "uploaded".to_string(),
        records_count: batch.records.len(),
    })
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Power Plant API" }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Validation("file part has no filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Validation(format!("failed to read file part: {e}")))?;

        let response = ingest_file(state.store.as_ref(), &state.cache, &file_name, bytes).await;
        if response.is_err() {
            metrics::counter!("upload_rejected_total").increment(1);
        }
        return response.map(Json);
    }

    Err(ServiceError::Validation("missing 'file' form field".to_string()))
}

async fn states(State(state): State<AppState>) -> Result<Json<Vec<String>>, ServiceError> {
    let states = state.cache.states().await?;
    Ok(Json((*states).clone()))
}

#[derive(Debug, Deserialize)]
struct PlantsQuery {
    state: String,
    limit: Option<usize>,
}

async fn plants(
    State(state): State<AppState>,
    Query(query): Query<PlantsQuery>,
) -> Result<Json<Vec<PlantAggregate>>, ServiceError> {
    let limit = query.limit.unwrap_or(state.default_limit).min(state.max_limit);
    let dataset = state.cache.dataset().await?;
    Ok(Json(top_plants(&dataset, &query.state, limit)))
}
