use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use pastport_core::{UnlockOutcome, answer, evaluate};
use pastport_types::api::{
    Claims, CreateEntryRequest, EntryResponse, UnlockRequest, UnlockResponse, UpdateEntryRequest,
};
use pastport_types::models::{Entry, EntryKind, NotificationType, UnlockMode};

use crate::auth::{AppState, AppStateInner};
use crate::ownership::{ResourceKind, require_owner};

// Route wrappers: each declares its resource kind explicitly.

pub async fn create_capsule(
    state: State<Arc<AppStateInner>>,
    claims: Extension<Claims>,
    req: Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    create_entry(state.0, claims.0, EntryKind::Capsule, req.0).await
}

pub async fn create_journal_entry(
    state: State<Arc<AppStateInner>>,
    claims: Extension<Claims>,
    req: Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    create_entry(state.0, claims.0, EntryKind::Journal, req.0).await
}

pub async fn list_capsules(
    state: State<Arc<AppStateInner>>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    list_entries(state.0, claims.0, EntryKind::Capsule).await
}

pub async fn list_journal_entries(
    state: State<Arc<AppStateInner>>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    list_entries(state.0, claims.0, EntryKind::Journal).await
}

pub async fn get_capsule(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    get_entry(state.0, claims.0, ResourceKind::Capsule, EntryKind::Capsule, id.0).await
}

pub async fn get_journal_entry(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    get_entry(state.0, claims.0, ResourceKind::Journal, EntryKind::Journal, id.0).await
}

pub async fn update_capsule(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
    req: Json<UpdateEntryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    update_entry(state.0, claims.0, ResourceKind::Capsule, EntryKind::Capsule, id.0, req.0).await
}

pub async fn update_journal_entry(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
    req: Json<UpdateEntryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    update_entry(state.0, claims.0, ResourceKind::Journal, EntryKind::Journal, id.0, req.0).await
}

pub async fn delete_capsule(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    delete_entry(state.0, claims.0, ResourceKind::Capsule, id.0).await
}

pub async fn delete_journal_entry(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    delete_entry(state.0, claims.0, ResourceKind::Journal, id.0).await
}

pub async fn unlock_capsule(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
    req: Json<UnlockRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    unlock_entry(state.0, claims.0, ResourceKind::Capsule, EntryKind::Capsule, id.0, req.0).await
}

pub async fn unlock_journal_entry(
    state: State<Arc<AppStateInner>>,
    id: Path<Uuid>,
    claims: Extension<Claims>,
    req: Json<UnlockRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    unlock_entry(state.0, claims.0, ResourceKind::Journal, EntryKind::Journal, id.0, req.0).await
}

// Shared handler bodies.

async fn create_entry(
    state: AppState,
    claims: Claims,
    kind: EntryKind,
    req: CreateEntryRequest,
) -> Result<(StatusCode, Json<EntryResponse>), StatusCode> {
    let title = req.title.trim();
    if title.is_empty() || title.len() > 200 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Mode/field coherence; the stored record keeps only the fields its
    // mode needs.
    let (unlock_at, riddle_question, riddle_answer_hash) = match req.unlock_mode {
        UnlockMode::Time => {
            let at = req.unlock_at.ok_or(StatusCode::BAD_REQUEST)?;
            (Some(at), None, None)
        }
        UnlockMode::Riddle => {
            let question = req
                .riddle_question
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .ok_or(StatusCode::BAD_REQUEST)?
                .to_string();
            let plain = req
                .riddle_answer
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .ok_or(StatusCode::BAD_REQUEST)?;
            (None, Some(question), Some(answer::hash_answer(plain)))
        }
        UnlockMode::None => (None, None, None),
    };

    let now = Utc::now();
    let entry = Entry {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        kind,
        title: title.to_string(),
        emoji: req.emoji,
        content: req.content,
        media_refs: req.media_refs,
        unlock_mode: req.unlock_mode,
        unlock_at,
        riddle_question,
        riddle_answer_hash,
        is_unlocked: false,
        unlocked_at: None,
        created_at: now,
        updated_at: now,
    };

    let response = EntryResponse::redacted(&entry);
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.insert_entry(&entry))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_entries(
    state: AppState,
    claims: Claims,
    kind: EntryKind,
) -> Result<Json<Vec<EntryResponse>>, StatusCode> {
    let db = state.db.clone();
    let owner = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.list_entries(&owner, kind))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(rows.iter().map(EntryResponse::redacted).collect()))
}

async fn get_entry(
    state: AppState,
    claims: Claims,
    rkind: ResourceKind,
    ekind: EntryKind,
    id: Uuid,
) -> Result<Json<EntryResponse>, StatusCode> {
    require_owner(&state, rkind, id, claims.sub).await?;
    let entry = fetch_entry(&state, id, ekind)
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(EntryResponse::redacted(&entry)))
}

async fn update_entry(
    state: AppState,
    claims: Claims,
    rkind: ResourceKind,
    ekind: EntryKind,
    id: Uuid,
    req: UpdateEntryRequest,
) -> Result<Json<EntryResponse>, StatusCode> {
    require_owner(&state, rkind, id, claims.sub).await?;
    let mut entry = fetch_entry(&state, id, ekind)
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Some(title) = req.title {
        let title = title.trim().to_string();
        if title.is_empty() || title.len() > 200 {
            return Err(StatusCode::BAD_REQUEST);
        }
        entry.title = title;
    }
    if let Some(emoji) = req.emoji {
        entry.emoji = Some(emoji);
    }
    if let Some(content) = req.content {
        entry.content = content;
    }
    if let Some(media_refs) = req.media_refs {
        entry.media_refs = media_refs;
    }
    entry.updated_at = Utc::now();

    let response = EntryResponse::redacted(&entry);
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.update_entry(&entry))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(response))
}

async fn delete_entry(
    state: AppState,
    claims: Claims,
    rkind: ResourceKind,
    id: Uuid,
) -> Result<StatusCode, StatusCode> {
    require_owner(&state, rkind, id, claims.sub).await?;

    // Associated notifications are left in place; their entry reference
    // is allowed to dangle.
    let db = state.db.clone();
    let deleted = tokio::task::spawn_blocking(move || db.delete_entry(&id.to_string()))
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

/// Synchronous unlock attempt: runs the evaluator directly instead of
/// waiting for the hourly pass.
async fn unlock_entry(
    state: AppState,
    claims: Claims,
    rkind: ResourceKind,
    ekind: EntryKind,
    id: Uuid,
    req: UnlockRequest,
) -> Result<Json<UnlockResponse>, StatusCode> {
    require_owner(&state, rkind, id, claims.sub).await?;
    let entry = fetch_entry(&state, id, ekind)
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let now = Utc::now();
    let outcome = evaluate(&entry, req.answer.as_deref(), now).map_err(|e| {
        // Data integrity fault, not a client error.
        error!("Unlock evaluation failed for entry {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let response = match outcome {
        UnlockOutcome::AlreadyUnlocked => UnlockResponse {
            outcome: "already_unlocked",
            entry: Some(EntryResponse::redacted(&entry)),
        },
        UnlockOutcome::AnswerRequired => UnlockResponse {
            outcome: "answer_required",
            entry: None,
        },
        UnlockOutcome::IncorrectAnswer => UnlockResponse {
            outcome: "incorrect_answer",
            entry: None,
        },
        UnlockOutcome::NotYetUnlockable => UnlockResponse {
            outcome: "not_yet_unlockable",
            entry: None,
        },
        UnlockOutcome::Unlockable => {
            let db = state.db.clone();
            let won = tokio::task::spawn_blocking(move || db.mark_unlocked(&id.to_string(), now))
                .await
                .map_err(|e| {
                    error!("spawn_blocking join error: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

            if won {
                let mut unlocked = entry;
                unlocked.is_unlocked = true;
                unlocked.unlocked_at = Some(now);

                // Best-effort: a failed notification never undoes the unlock.
                if let Err(e) = state
                    .notifier
                    .emit(
                        unlocked.user_id,
                        NotificationType::CapsuleUnlocked,
                        &format!("\"{}\" has unlocked", unlocked.title),
                        unlocked_message(unlocked.kind),
                        serde_json::json!({"entry_id": unlocked.id, "kind": unlocked.kind}),
                    )
                    .await
                {
                    warn!("Unlock notification for entry {} failed: {}", unlocked.id, e);
                }

                UnlockResponse {
                    outcome: "unlocked",
                    entry: Some(EntryResponse::redacted(&unlocked)),
                }
            } else {
                // Raced with the scanner (or a concurrent call); surface
                // the idempotent result.
                let entry = fetch_entry(&state, id, ekind)
                    .await?
                    .ok_or(StatusCode::NOT_FOUND)?;
                UnlockResponse {
                    outcome: "already_unlocked",
                    entry: Some(EntryResponse::redacted(&entry)),
                }
            }
        }
    };

    Ok(Json(response))
}

fn unlocked_message(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Capsule => "A capsule from your past is ready. Open PastPort to read it.",
        EntryKind::Journal => "A journal entry you sealed is ready. Open PastPort to read it.",
    }
}

async fn fetch_entry(
    state: &AppState,
    id: Uuid,
    kind: EntryKind,
) -> Result<Option<Entry>, StatusCode> {
    let db = state.db.clone();
    let entry = tokio::task::spawn_blocking(move || db.get_entry(&id.to_string()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(entry.filter(|e| e.kind == kind))
}
