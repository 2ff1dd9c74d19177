use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use pastport_types::api::{Claims, PrefsResponse, UpdatePrefsRequest};
use pastport_types::models::NotificationPrefs;

use crate::auth::AppStateInner;

pub async fn get_prefs(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let prefs = load_prefs(&state, &claims).await?;
    Ok(Json(PrefsResponse { prefs }))
}

pub async fn update_prefs(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePrefsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut prefs = load_prefs(&state, &claims).await?;
    if let Some(flag) = req.email_notifications {
        prefs.email_notifications = flag;
    }
    if let Some(flag) = req.unlock_reminder_emails {
        prefs.unlock_reminder_emails = flag;
    }

    let db = state.db.clone();
    let user = claims.sub.to_string();
    let updated = tokio::task::spawn_blocking(move || db.update_prefs(&user, prefs))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(PrefsResponse { prefs }))
}

async fn load_prefs(
    state: &Arc<AppStateInner>,
    claims: &Claims,
) -> Result<NotificationPrefs, StatusCode> {
    let db = state.db.clone();
    let user = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || db.get_user_by_id(&user))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(NotificationPrefs {
        email_notifications: row.email_notifications,
        unlock_reminder_emails: row.unlock_reminder_emails,
    })
}
