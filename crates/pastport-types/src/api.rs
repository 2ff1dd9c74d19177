use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Entry, EntryKind, NotificationPrefs, UnlockMode};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the auth handlers.
/// Canonical definition lives here in pastport-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Entries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEntryRequest {
    pub title: String,
    pub emoji: Option<String>,
    pub content: String,
    #[serde(default)]
    pub media_refs: Vec<String>,
    pub unlock_mode: UnlockMode,
    pub unlock_at: Option<DateTime<Utc>>,
    pub riddle_question: Option<String>,
    /// Plaintext riddle answer; hashed server-side, never stored or echoed.
    pub riddle_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub content: Option<String>,
    pub media_refs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnlockRequest {
    pub answer: Option<String>,
}

/// Client view of an entry. While locked, only metadata is populated:
/// content and media references are withheld, and the answer hash is
/// never present in any view.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: EntryKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_refs: Option<Vec<String>>,
    pub unlock_mode: UnlockMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub riddle_question: Option<String>,
    pub is_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryResponse {
    /// Build the client view, withholding content while the entry is locked.
    pub fn redacted(entry: &Entry) -> Self {
        let unlocked = entry.is_unlocked;
        Self {
            id: entry.id,
            user_id: entry.user_id,
            kind: entry.kind,
            title: entry.title.clone(),
            emoji: entry.emoji.clone(),
            content: unlocked.then(|| entry.content.clone()),
            media_refs: unlocked.then(|| entry.media_refs.clone()),
            unlock_mode: entry.unlock_mode,
            unlock_at: entry.unlock_at,
            riddle_question: entry.riddle_question.clone(),
            is_unlocked: unlocked,
            unlocked_at: entry.unlocked_at,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    /// One of: unlocked, already_unlocked, answer_required,
    /// incorrect_answer, not_yet_unlockable.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryResponse>,
}

// -- Preferences --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrefsRequest {
    pub email_notifications: Option<bool>,
    pub unlock_reminder_emails: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PrefsResponse {
    #[serde(flatten)]
    pub prefs: NotificationPrefs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, UnlockMode};
    use chrono::TimeZone;

    fn entry(unlocked: bool) -> Entry {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Entry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: EntryKind::Capsule,
            title: "to my future self".into(),
            emoji: Some("⏳".into()),
            content: "secret plans".into(),
            media_refs: vec!["media/abc123".into()],
            unlock_mode: UnlockMode::Time,
            unlock_at: Some(t),
            riddle_question: None,
            riddle_answer_hash: Some("deadbeef".into()),
            is_unlocked: unlocked,
            unlocked_at: unlocked.then_some(t),
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn locked_view_withholds_content() {
        let view = EntryResponse::redacted(&entry(false));
        assert!(view.content.is_none());
        assert!(view.media_refs.is_none());
        assert_eq!(view.title, "to my future self");
        assert_eq!(view.emoji.as_deref(), Some("⏳"));
    }

    #[test]
    fn unlocked_view_reveals_content() {
        let view = EntryResponse::redacted(&entry(true));
        assert_eq!(view.content.as_deref(), Some("secret plans"));
        assert_eq!(view.media_refs.as_deref(), Some(&["media/abc123".to_string()][..]));
    }

    #[test]
    fn answer_hash_never_serialized() {
        let json = serde_json::to_string(&EntryResponse::redacted(&entry(true))).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("riddle_answer_hash"));
    }
}
