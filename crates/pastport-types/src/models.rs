use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user notification preferences. Both flags must be true for an
/// unlock-related email to go out; the in-app notification record is
/// written regardless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub email_notifications: bool,
    pub unlock_reminder_emails: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email_notifications: true,
            unlock_reminder_emails: true,
        }
    }
}

/// Capsules and journal entries are two presentations of the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Capsule,
    Journal,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Capsule => "capsule",
            EntryKind::Journal => "journal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockMode {
    Time,
    Riddle,
    None,
}

impl UnlockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockMode::Time => "time",
            UnlockMode::Riddle => "riddle",
            UnlockMode::None => "none",
        }
    }
}

/// An entry's content stays server-side until `is_unlocked` flips.
/// Only metadata (title, emoji, creation date) is visible before that;
/// see `api::EntryResponse` for the redaction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: EntryKind,
    pub title: String,
    pub emoji: Option<String>,
    pub content: String,
    /// Opaque references to media stored by an external provider.
    pub media_refs: Vec<String>,
    pub unlock_mode: UnlockMode,
    pub unlock_at: Option<DateTime<Utc>>,
    pub riddle_question: Option<String>,
    /// SHA-256 hex digest of the normalized answer. Never serialized to clients.
    pub riddle_answer_hash: Option<String>,
    /// Monotonic: false -> true, never back.
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CapsuleUnlocked,
    UnlockReminder,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CapsuleUnlocked => "capsule_unlocked",
            NotificationType::UnlockReminder => "unlock_reminder",
            NotificationType::System => "system",
        }
    }
}

/// Created exclusively by server-side events; clients can only list,
/// mark read, and delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Reference payload, e.g. {"entry_id": ..., "kind": ...}. May dangle
    /// after the referenced entry is deleted.
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    /// Past this point the record is eligible for the cleanup pass.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
