use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;

use pastport_types::models::{Entry, EntryKind, Notification, NotificationPrefs};

use crate::Database;
use crate::models::{EntryRow, NotificationRow, UserRow, format_ts};

const ENTRY_COLS: &str = "id, user_id, kind, title, emoji, content, media_refs, unlock_mode, \
     unlock_at, riddle_question, riddle_answer_hash, is_unlocked, unlocked_at, \
     created_at, updated_at";

const NOTIFICATION_COLS: &str =
    "id, user_id, type, title, message, data, is_read, read_at, expires_at, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, username, password_hash, email, format_ts(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, password, email, email_notifications,
                        unlock_reminder_emails, created_at
                 FROM users WHERE username = ?1",
                [username],
                map_user_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, password, email, email_notifications,
                        unlock_reminder_emails, created_at
                 FROM users WHERE id = ?1",
                [id],
                map_user_row,
            )
            .optional()
        })
    }

    pub fn update_prefs(&self, user_id: &str, prefs: NotificationPrefs) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET email_notifications = ?2, unlock_reminder_emails = ?3
                 WHERE id = ?1",
                rusqlite::params![
                    user_id,
                    prefs.email_notifications,
                    prefs.unlock_reminder_emails
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- Entries --

    pub fn insert_entry(&self, entry: &Entry) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO entries (id, user_id, kind, title, emoji, content, media_refs,
                                      unlock_mode, unlock_at, riddle_question,
                                      riddle_answer_hash, is_unlocked, unlocked_at,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.kind.as_str(),
                    entry.title,
                    entry.emoji,
                    entry.content,
                    serde_json::to_string(&entry.media_refs)?,
                    entry.unlock_mode.as_str(),
                    entry.unlock_at.map(format_ts),
                    entry.riddle_question,
                    entry.riddle_answer_hash,
                    entry.is_unlocked,
                    entry.unlocked_at.map(format_ts),
                    format_ts(entry.created_at),
                    format_ts(entry.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLS} FROM entries WHERE id = ?1"),
                [id],
                map_entry_row,
            )
            .optional()
        })?;
        row.map(EntryRow::into_domain).transpose()
    }

    pub fn list_entries(&self, user_id: &str, kind: EntryKind) -> Result<Vec<Entry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLS} FROM entries
                 WHERE user_id = ?1 AND kind = ?2
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, kind.as_str()], map_entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows_to_entries(rows))
    }

    /// Persist owner edits to the mutable fields. Unlock state is never
    /// touched here; see `mark_unlocked`.
    pub fn update_entry(&self, entry: &Entry) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE entries
                 SET title = ?2, emoji = ?3, content = ?4, media_refs = ?5, updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    entry.id.to_string(),
                    entry.title,
                    entry.emoji,
                    entry.content,
                    serde_json::to_string(&entry.media_refs)?,
                    format_ts(entry.updated_at),
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_entry(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// The unlock transition, guarded so it happens at most once: the
    /// `is_unlocked = 0` predicate makes a second attempt (scanner racing
    /// a manual unlock, overlapping passes) a no-op. Returns whether this
    /// call won the transition.
    pub fn mark_unlocked(&self, id: &str, unlocked_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE entries SET is_unlocked = 1, unlocked_at = ?2
                 WHERE id = ?1 AND is_unlocked = 0",
                rusqlite::params![id, format_ts(unlocked_at)],
            )?;
            Ok(n > 0)
        })
    }

    /// Candidates for the hourly unlock pass: time-locked, still locked,
    /// deadline elapsed. Already-unlocked entries are excluded by the
    /// predicate itself.
    pub fn due_time_locked(&self, now: DateTime<Utc>) -> Result<Vec<Entry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLS} FROM entries
                 WHERE unlock_mode = 'time' AND is_unlocked = 0 AND unlock_at <= ?1
                 ORDER BY unlock_at"
            ))?;
            let rows = stmt
                .query_map([format_ts(now)], map_entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows_to_entries(rows))
    }

    /// Candidates for the daily look-ahead pass: time-locked entries whose
    /// deadline falls inside [start, end).
    pub fn unlocking_within(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Entry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLS} FROM entries
                 WHERE unlock_mode = 'time' AND is_unlocked = 0
                   AND unlock_at >= ?1 AND unlock_at < ?2
                 ORDER BY unlock_at"
            ))?;
            let rows = stmt
                .query_map([format_ts(start), format_ts(end)], map_entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows_to_entries(rows))
    }

    // -- Notifications --

    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, type, title, message, data,
                                            is_read, read_at, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.kind.as_str(),
                    n.title,
                    n.message,
                    serde_json::to_string(&n.data)?,
                    n.is_read,
                    n.read_at.map(format_ts),
                    n.expires_at.map(format_ts),
                    format_ts(n.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {NOTIFICATION_COLS} FROM notifications WHERE id = ?1"),
                [id],
                map_notification_row,
            )
            .optional()
        })?;
        row.map(NotificationRow::into_domain).transpose()
    }

    pub fn list_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], map_notification_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_domain() {
                Ok(n) => out.push(n),
                Err(e) => warn!("Skipping corrupt notification row: {}", e),
            }
        }
        Ok(out)
    }

    /// Guarded like the unlock transition: `read_at` is set only by the
    /// first call. Returns whether this call flipped the flag.
    pub fn mark_notification_read(&self, id: &str, read_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1, read_at = ?2
                 WHERE id = ?1 AND is_read = 0",
                rusqlite::params![id, format_ts(read_at)],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM notifications WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Daily cleanup pass: purge notifications past their expiry.
    pub fn delete_expired_notifications(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM notifications
                 WHERE expires_at IS NOT NULL AND expires_at < ?1",
                [format_ts(now)],
            )?;
            Ok(n)
        })
    }
}

fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        email_notifications: row.get(4)?,
        unlock_reminder_emails: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        emoji: row.get(4)?,
        content: row.get(5)?,
        media_refs: row.get(6)?,
        unlock_mode: row.get(7)?,
        unlock_at: row.get(8)?,
        riddle_question: row.get(9)?,
        riddle_answer_hash: row.get(10)?,
        is_unlocked: row.get(11)?,
        unlocked_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn map_notification_row(row: &rusqlite::Row) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        data: row.get(5)?,
        is_read: row.get(6)?,
        read_at: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Corrupt rows are logged and skipped so one bad record cannot take a
/// whole scan or listing down with it.
fn rows_to_entries(rows: Vec<EntryRow>) -> Vec<Entry> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_domain() {
            Ok(e) => out.push(e),
            Err(e) => warn!("Skipping corrupt entry row: {}", e),
        }
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pastport_types::models::{NotificationType, UnlockMode};
    use uuid::Uuid;

    fn open_temp_db() -> Database {
        let path = std::env::temp_dir().join(format!("pastport-test-{}.db", Uuid::new_v4()));
        Database::open(&path).expect("open temp db")
    }

    fn seed_user(db: &Database, email: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(
            &id.to_string(),
            &format!("user-{}", &id.to_string()[..8]),
            "$argon2id$fake",
            email,
            Utc::now(),
        )
        .unwrap();
        id
    }

    fn time_entry(user_id: Uuid, unlock_at: DateTime<Utc>) -> Entry {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Entry {
            id: Uuid::new_v4(),
            user_id,
            kind: EntryKind::Capsule,
            title: "capsule".into(),
            emoji: None,
            content: "sealed".into(),
            media_refs: vec![],
            unlock_mode: UnlockMode::Time,
            unlock_at: Some(unlock_at),
            riddle_question: None,
            riddle_answer_hash: None,
            is_unlocked: false,
            unlocked_at: None,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn entry_round_trips_through_store() {
        let db = open_temp_db();
        let owner = seed_user(&db, None);
        let mut e = time_entry(owner, Utc.with_ymd_and_hms(2027, 6, 1, 8, 0, 0).unwrap());
        e.media_refs = vec!["media/xyz".into()];
        db.insert_entry(&e).unwrap();

        let got = db.get_entry(&e.id.to_string()).unwrap().unwrap();
        assert_eq!(got.id, e.id);
        assert_eq!(got.unlock_mode, UnlockMode::Time);
        assert_eq!(got.unlock_at, e.unlock_at);
        assert_eq!(got.media_refs, vec!["media/xyz".to_string()]);
        assert!(!got.is_unlocked);
    }

    #[test]
    fn mark_unlocked_is_guarded_and_idempotent() {
        let db = open_temp_db();
        let owner = seed_user(&db, None);
        let e = time_entry(owner, Utc::now() - Duration::days(1));
        db.insert_entry(&e).unwrap();

        let first_at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        assert!(db.mark_unlocked(&e.id.to_string(), first_at).unwrap());
        // Second attempt loses the guard and must not move unlocked_at.
        assert!(!db
            .mark_unlocked(&e.id.to_string(), first_at + Duration::hours(5))
            .unwrap());

        let got = db.get_entry(&e.id.to_string()).unwrap().unwrap();
        assert!(got.is_unlocked);
        assert_eq!(got.unlocked_at, Some(first_at));
    }

    #[test]
    fn due_query_excludes_unlocked_riddle_and_future_entries() {
        let db = open_temp_db();
        let owner = seed_user(&db, None);
        let now = Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap();

        let due = time_entry(owner, now - Duration::days(1));
        let boundary = time_entry(owner, now);
        let future = time_entry(owner, now + Duration::hours(1));
        let mut done = time_entry(owner, now - Duration::days(2));
        done.is_unlocked = true;
        done.unlocked_at = Some(now - Duration::days(2));
        let mut riddle = time_entry(owner, now - Duration::days(3));
        riddle.unlock_mode = UnlockMode::Riddle;
        riddle.unlock_at = None;
        riddle.riddle_question = Some("?".into());
        riddle.riddle_answer_hash = Some("abc".into());

        for e in [&due, &boundary, &future, &done, &riddle] {
            db.insert_entry(e).unwrap();
        }

        let found = db.due_time_locked(now).unwrap();
        let ids: Vec<Uuid> = found.iter().map(|e| e.id).collect();
        assert!(ids.contains(&due.id));
        assert!(ids.contains(&boundary.id), "boundary is inclusive");
        assert!(!ids.contains(&future.id));
        assert!(!ids.contains(&done.id));
        assert!(!ids.contains(&riddle.id));
    }

    #[test]
    fn lookahead_window_is_half_open() {
        let db = open_temp_db();
        let owner = seed_user(&db, None);
        let start = Utc.with_ymd_and_hms(2026, 8, 9, 0, 0, 0).unwrap();
        let end = start + Duration::hours(24);

        let at_start = time_entry(owner, start);
        let inside = time_entry(owner, start + Duration::hours(12));
        let at_end = time_entry(owner, end);
        let before = time_entry(owner, start - Duration::seconds(1));

        for e in [&at_start, &inside, &at_end, &before] {
            db.insert_entry(e).unwrap();
        }

        let found = db.unlocking_within(start, end).unwrap();
        let ids: Vec<Uuid> = found.iter().map(|e| e.id).collect();
        assert!(ids.contains(&at_start.id));
        assert!(ids.contains(&inside.id));
        assert!(!ids.contains(&at_end.id));
        assert!(!ids.contains(&before.id));
    }

    #[test]
    fn expired_notifications_are_purged_others_kept() {
        let db = open_temp_db();
        let user = seed_user(&db, None);
        let now = Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap();

        let make = |expires_at: Option<DateTime<Utc>>| Notification {
            id: Uuid::new_v4(),
            user_id: user,
            kind: NotificationType::UnlockReminder,
            title: "reminder".into(),
            message: "soon".into(),
            data: serde_json::json!({}),
            is_read: false,
            read_at: None,
            expires_at,
            created_at: now - Duration::days(10),
        };

        let expired = make(Some(now - Duration::days(1)));
        let live = make(Some(now + Duration::days(1)));
        let forever = make(None);
        db.insert_notification(&expired).unwrap();
        db.insert_notification(&live).unwrap();
        db.insert_notification(&forever).unwrap();

        assert_eq!(db.delete_expired_notifications(now).unwrap(), 1);
        let left = db.list_notifications(&user.to_string(), 50).unwrap();
        let ids: Vec<Uuid> = left.iter().map(|n| n.id).collect();
        assert!(!ids.contains(&expired.id));
        assert!(ids.contains(&live.id));
        assert!(ids.contains(&forever.id));
    }

    #[test]
    fn notification_read_flag_is_monotonic() {
        let db = open_temp_db();
        let user = seed_user(&db, None);
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: user,
            kind: NotificationType::CapsuleUnlocked,
            title: "unlocked".into(),
            message: "open it".into(),
            data: serde_json::json!({"entry_id": Uuid::new_v4()}),
            is_read: false,
            read_at: None,
            expires_at: None,
            created_at: Utc::now(),
        };
        db.insert_notification(&n).unwrap();

        let first = Utc.with_ymd_and_hms(2026, 8, 8, 9, 0, 0).unwrap();
        assert!(db.mark_notification_read(&n.id.to_string(), first).unwrap());
        assert!(!db
            .mark_notification_read(&n.id.to_string(), first + Duration::hours(1))
            .unwrap());

        let got = db.get_notification(&n.id.to_string()).unwrap().unwrap();
        assert!(got.is_read);
        assert_eq!(got.read_at, Some(first));
    }
}
