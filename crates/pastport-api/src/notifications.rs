use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use pastport_types::api::Claims;
use pastport_types::models::Notification;

use crate::auth::AppStateInner;
use crate::ownership::{ResourceKind, require_owner};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_notifications(
    State(state): State<Arc<AppStateInner>>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user = claims.sub.to_string();
    let limit = query.limit.min(200);

    let rows: Vec<Notification> =
        tokio::task::spawn_blocking(move || db.list_notifications(&user, limit))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(rows))
}

pub async fn mark_read(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_owner(&state, ResourceKind::Notification, id, claims.sub).await?;

    let db = state.db.clone();
    // Monotonic: only the first call flips the flag and stamps read_at.
    let newly_read =
        tokio::task::spawn_blocking(move || db.mark_notification_read(&id.to_string(), Utc::now()))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({ "read": newly_read })))
}

pub async fn delete_notification(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_owner(&state, ResourceKind::Notification, id, claims.sub).await?;

    let db = state.db.clone();
    let deleted = tokio::task::spawn_blocking(move || db.delete_notification(&id.to_string()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
