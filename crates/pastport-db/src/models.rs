//! Database row types mapping directly to SQLite rows. Kept distinct
//! from the pastport-types API models so the DB layer stays independent;
//! `into_domain` conversions parse IDs, enums and timestamps into their
//! typed forms.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use pastport_types::models::{
    Entry, EntryKind, Notification, NotificationType, UnlockMode,
};

/// All timestamps are stored as RFC 3339 UTC with whole-second precision
/// ("2026-03-01T12:00:00Z"), a fixed-width form so SQLite string
/// comparison orders them correctly.
pub fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("bad timestamp '{}': {}", s, e))
}

fn parse_opt_ts(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub email_notifications: bool,
    pub unlock_reminder_emails: bool,
    pub created_at: String,
}

pub struct EntryRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub emoji: Option<String>,
    pub content: String,
    pub media_refs: String,
    pub unlock_mode: String,
    pub unlock_at: Option<String>,
    pub riddle_question: Option<String>,
    pub riddle_answer_hash: Option<String>,
    pub is_unlocked: bool,
    pub unlocked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EntryRow {
    pub fn into_domain(self) -> Result<Entry> {
        let kind = match self.kind.as_str() {
            "capsule" => EntryKind::Capsule,
            "journal" => EntryKind::Journal,
            other => return Err(anyhow!("entry {}: unknown kind '{}'", self.id, other)),
        };
        let unlock_mode = match self.unlock_mode.as_str() {
            "time" => UnlockMode::Time,
            "riddle" => UnlockMode::Riddle,
            "none" => UnlockMode::None,
            other => return Err(anyhow!("entry {}: unknown unlock mode '{}'", self.id, other)),
        };
        Ok(Entry {
            id: self.id.parse::<Uuid>()?,
            user_id: self.user_id.parse::<Uuid>()?,
            kind,
            title: self.title,
            emoji: self.emoji,
            content: self.content,
            media_refs: serde_json::from_str(&self.media_refs)?,
            unlock_mode,
            unlock_at: parse_opt_ts(self.unlock_at.as_deref())?,
            riddle_question: self.riddle_question,
            riddle_answer_hash: self.riddle_answer_hash,
            is_unlocked: self.is_unlocked,
            unlocked_at: parse_opt_ts(self.unlocked_at.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_domain(self) -> Result<Notification> {
        let kind = match self.kind.as_str() {
            "capsule_unlocked" => NotificationType::CapsuleUnlocked,
            "unlock_reminder" => NotificationType::UnlockReminder,
            "system" => NotificationType::System,
            other => {
                return Err(anyhow!(
                    "notification {}: unknown type '{}'",
                    self.id,
                    other
                ));
            }
        };
        Ok(Notification {
            id: self.id.parse::<Uuid>()?,
            user_id: self.user_id.parse::<Uuid>()?,
            kind,
            title: self.title,
            message: self.message,
            data: serde_json::from_str(&self.data)?,
            is_read: self.is_read,
            read_at: parse_opt_ts(self.read_at.as_deref())?,
            expires_at: parse_opt_ts(self.expires_at.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_at_fixed_width() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let s = format_ts(dt);
        assert_eq!(s, "2026-03-01T12:00:00Z");
        assert_eq!(parse_ts(&s).unwrap(), dt);
    }

    #[test]
    fn formatted_timestamps_order_lexicographically() {
        let a = format_ts(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let b = format_ts(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap());
        let c = format_ts(Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap());
        assert!(a < b && b < c);
    }
}
