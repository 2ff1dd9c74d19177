//! Per-resource-kind ownership checks.
//!
//! Each kind declares how its owner is resolved; handlers state the kind
//! they operate on explicitly rather than having it inferred from the
//! request path.

use axum::http::StatusCode;
use tracing::error;
use uuid::Uuid;

use pastport_db::Database;
use pastport_types::models::EntryKind;

use crate::auth::AppState;

#[derive(Debug, Clone, Copy)]
pub enum ResourceKind {
    Capsule,
    Journal,
    Notification,
}

impl ResourceKind {
    /// Resolve the owning user, or `None` if the resource does not exist
    /// (or is of a different kind than the caller declared).
    fn owner_of(&self, db: &Database, id: &str) -> anyhow::Result<Option<Uuid>> {
        match self {
            ResourceKind::Capsule => entry_owner(db, id, EntryKind::Capsule),
            ResourceKind::Journal => entry_owner(db, id, EntryKind::Journal),
            ResourceKind::Notification => Ok(db.get_notification(id)?.map(|n| n.user_id)),
        }
    }
}

fn entry_owner(db: &Database, id: &str, kind: EntryKind) -> anyhow::Result<Option<Uuid>> {
    Ok(db
        .get_entry(id)?
        .filter(|e| e.kind == kind)
        .map(|e| e.user_id))
}

/// 404 when the resource is missing, 403 when it belongs to someone else.
pub async fn require_owner(
    state: &AppState,
    kind: ResourceKind,
    id: Uuid,
    user: Uuid,
) -> Result<(), StatusCode> {
    let db = state.db.clone();
    let owner = tokio::task::spawn_blocking(move || kind.owner_of(&db, &id.to_string()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Ownership lookup failed for {:?} {}: {}", kind, id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match owner {
        None => Err(StatusCode::NOT_FOUND),
        Some(o) if o == user => Ok(()),
        Some(_) => Err(StatusCode::FORBIDDEN),
    }
}
