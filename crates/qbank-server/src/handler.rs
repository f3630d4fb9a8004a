use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::Value;

use crate::endpoint::HealthResponse;
use crate::error::ServerResult;
use crate::settings::SettingsStore;

pub type AppState = Arc<SettingsStore>;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /storage/{user}`: every synced namespace, `null` when unset.
pub async fn snapshot_handler(
    State(settings): State<AppState>,
    Path(user): Path<String>,
) -> ServerResult<Json<Value>> {
    Ok(Json(settings.snapshot(&user)?))
}

/// `PUT|POST /storage/{user}/{namespace}`
pub async fn put_namespace_handler(
    State(settings): State<AppState>,
    Path((user, namespace)): Path<(String, String)>,
    body: String,
) -> ServerResult<StatusCode> {
    let ns = SettingsStore::namespace(&namespace)?;
    settings.replace(&user, ns, &body)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /storage/{user}/{namespace}`
pub async fn delete_namespace_handler(
    State(settings): State<AppState>,
    Path((user, namespace)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let ns = SettingsStore::namespace(&namespace)?;
    settings.clear(&user, ns)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT|POST /storage/{user}/{namespace}/{index}`
pub async fn put_entry_handler(
    State(settings): State<AppState>,
    Path((user, namespace, index)): Path<(String, String, String)>,
    body: String,
) -> ServerResult<StatusCode> {
    let ns = SettingsStore::namespace(&namespace)?;
    settings.set_index(&user, ns, &index, &body)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /storage/{user}/{namespace}/{index}`
pub async fn delete_entry_handler(
    State(settings): State<AppState>,
    Path((user, namespace, index)): Path<(String, String, String)>,
) -> ServerResult<StatusCode> {
    let ns = SettingsStore::namespace(&namespace)?;
    settings.delete_index(&user, ns, &index)?;
    Ok(StatusCode::NO_CONTENT)
}
