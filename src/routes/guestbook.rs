//! Guestbook route handlers
//!
//! Each handler makes exactly one store call and passes the store's rows
//! through untouched.

use crate::error::{ApiResult, AppError, JsonBody};
use crate::models::{MessageResponse, DELETED_MESSAGE};
use crate::state::SharedState;
use crate::store::Entry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info};

/// List all entries, newest first
pub async fn list_entries(State(state): State<SharedState>) -> ApiResult<Json<Vec<Entry>>> {
    let entries = state.store.list().await.map_err(AppError::Read)?;
    debug!("Listed {} guestbook entries", entries.len());
    Ok(Json(entries))
}

/// Insert one entry with whatever fields the client sent
pub async fn create_entry(
    State(state): State<SharedState>,
    JsonBody(fields): JsonBody<Entry>,
) -> ApiResult<(StatusCode, Json<Vec<Entry>>)> {
    debug!("Creating guestbook entry with fields: {:?}", fields.keys().collect::<Vec<_>>());

    let rows = state.store.insert(fields).await.map_err(AppError::Write)?;

    info!("Guestbook entry created ({} row(s))", rows.len());
    Ok((StatusCode::CREATED, Json(rows)))
}

/// Update the entry with the given id
pub async fn update_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(fields): JsonBody<Entry>,
) -> ApiResult<Json<Vec<Entry>>> {
    debug!("Updating guestbook entry {}", id);

    let rows = state.store.update(&id, fields).await.map_err(AppError::Write)?;

    info!("Guestbook entry {} updated ({} row(s))", id, rows.len());
    Ok(Json(rows))
}

/// Delete the entry with the given id
pub async fn delete_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    debug!("Deleting guestbook entry {}", id);

    state.store.delete(&id).await.map_err(AppError::Write)?;

    info!("Guestbook entry {} deleted", id);
    Ok(Json(MessageResponse::new(DELETED_MESSAGE)))
}
