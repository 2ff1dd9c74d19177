//! The scheduled pass bodies.
//!
//! Each pass takes `now` from the caller, queries its own predicate and
//! processes entries sequentially. Per-entry failures are logged and do
//! not abort the pass: a crash or error mid-pass leaves the remaining
//! entries to the next run, whose query predicate naturally excludes
//! anything already transitioned (at-least-once, idempotent per entry).

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::warn;

use pastport_core::evaluate;
use pastport_db::Database;
use pastport_notify::Notifier;
use pastport_types::models::{Entry, EntryKind, NotificationType};

/// Hourly: find time-locked entries whose deadline has elapsed, persist
/// the unlock transition and notify the owner. Returns how many entries
/// transitioned in this pass.
pub async fn run_unlock_pass(
    db: &Arc<Database>,
    notifier: &Notifier,
    now: DateTime<Utc>,
) -> Result<usize> {
    let due = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || db.due_time_locked(now))
            .await
            .context("due query task panicked")??
    };

    let mut unlocked = 0;
    for entry in due {
        match unlock_due_entry(db, notifier, &entry, now).await {
            Ok(true) => unlocked += 1,
            Ok(false) => {}
            Err(e) => warn!("Unlock pass: entry {} failed: {}", entry.id, e),
        }
    }
    Ok(unlocked)
}

/// Evaluate → persist → notify, strictly in that order for one entry.
/// Returns whether this call performed the transition.
async fn unlock_due_entry(
    db: &Arc<Database>,
    notifier: &Notifier,
    entry: &Entry,
    now: DateTime<Utc>,
) -> Result<bool> {
    let outcome = evaluate(entry, None, now)?;
    if !outcome.is_unlockable() {
        return Ok(false);
    }

    let won = {
        let db = db.clone();
        let id = entry.id.to_string();
        tokio::task::spawn_blocking(move || db.mark_unlocked(&id, now))
            .await
            .context("unlock persist task panicked")??
    };
    if !won {
        // A manual unlock (or an overlapping pass) got there first and
        // already notified.
        return Ok(false);
    }

    notifier
        .emit(
            entry.user_id,
            NotificationType::CapsuleUnlocked,
            &format!("\"{}\" has unlocked", entry.title),
            unlocked_message(entry.kind),
            serde_json::json!({"entry_id": entry.id, "kind": entry.kind}),
        )
        .await?;
    Ok(true)
}

fn unlocked_message(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Capsule => "A capsule from your past is ready. Open PastPort to read it.",
        EntryKind::Journal => "A journal entry you sealed is ready. Open PastPort to read it.",
    }
}

/// Start of the fixed 24-hour look-ahead window: the next UTC midnight
/// after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + chrono::Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Daily: remind owners about entries unlocking during the next calendar
/// day. Does not touch unlock state. An entry can be reminded again on a
/// later day if it is still locked; there is no deduplication ledger.
pub async fn run_lookahead_pass(
    db: &Arc<Database>,
    notifier: &Notifier,
    now: DateTime<Utc>,
) -> Result<usize> {
    let start = next_utc_midnight(now);
    let end = start + Duration::hours(24);

    let upcoming = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || db.unlocking_within(start, end))
            .await
            .context("look-ahead query task panicked")??
    };

    let mut reminded = 0;
    for entry in upcoming {
        match remind_entry(notifier, &entry).await {
            Ok(()) => reminded += 1,
            Err(e) => warn!("Look-ahead pass: entry {} failed: {}", entry.id, e),
        }
    }
    Ok(reminded)
}

async fn remind_entry(notifier: &Notifier, entry: &Entry) -> Result<()> {
    // unlocking_within only returns time-mode rows with a deadline set.
    let unlock_at = entry
        .unlock_at
        .context("look-ahead candidate without unlock_at")?;

    notifier
        .emit_expiring(
            entry.user_id,
            NotificationType::UnlockReminder,
            &format!("\"{}\" unlocks tomorrow", entry.title),
            &format!(
                "It unlocks at {}. Not long now.",
                unlock_at.format("%Y-%m-%d %H:%M UTC")
            ),
            serde_json::json!({"entry_id": entry.id, "kind": entry.kind}),
            // The reminder is stale once the real unlock notification has
            // had a week to land; let the cleanup pass collect it.
            Some(unlock_at + Duration::days(7)),
        )
        .await?;
    Ok(())
}

/// Daily: purge notifications past their expiry. Storage hygiene only.
pub async fn run_cleanup_pass(db: &Arc<Database>, now: DateTime<Utc>) -> Result<usize> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || db.delete_expired_notifications(now))
        .await
        .context("cleanup task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Scheduler, SchedulerConfig};
    use chrono::TimeZone;
    use pastport_core::answer::hash_answer;
    use pastport_notify::email::create_provider;
    use pastport_types::models::{Notification, UnlockMode};
    use uuid::Uuid;

    fn open_temp_db() -> Arc<Database> {
        let path = std::env::temp_dir().join(format!("pastport-test-{}.db", Uuid::new_v4()));
        Arc::new(Database::open(&path).expect("open temp db"))
    }

    fn notifier(db: &Arc<Database>) -> Arc<Notifier> {
        Arc::new(Notifier::new(db.clone(), create_provider(None).unwrap()))
    }

    fn seed_user(db: &Database) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(
            &id.to_string(),
            &format!("user-{}", &id.to_string()[..8]),
            "$argon2id$fake",
            None,
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
            title: "sealed capsule".into(),
            emoji: None,
            content: "from the past".into(),
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

    #[tokio::test]
    async fn due_entry_unlocks_with_exactly_one_notification() {
        let db = open_temp_db();
        let notifier = notifier(&db);
        let owner = seed_user(&db);
        let now = Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap();
        let entry = time_entry(owner, now - Duration::days(1));
        db.insert_entry(&entry).unwrap();

        assert_eq!(run_unlock_pass(&db, &notifier, now).await.unwrap(), 1);

        let stored = db.get_entry(&entry.id.to_string()).unwrap().unwrap();
        assert!(stored.is_unlocked);
        assert_eq!(stored.unlocked_at, Some(now));

        let notifications = db.list_notifications(&owner.to_string(), 10).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationType::CapsuleUnlocked);

        // A second run finds nothing: the predicate excludes unlocked
        // entries, so no duplicate processing happens.
        assert_eq!(run_unlock_pass(&db, &notifier, now).await.unwrap(), 0);
        assert_eq!(db.list_notifications(&owner.to_string(), 10).unwrap().len(), 1);
        let after = db.get_entry(&entry.id.to_string()).unwrap().unwrap();
        assert_eq!(after.unlocked_at, Some(now));
    }

    #[tokio::test]
    async fn riddle_entries_are_never_auto_unlocked() {
        let db = open_temp_db();
        let notifier = notifier(&db);
        let owner = seed_user(&db);
        let now = Utc::now();

        let mut riddle = time_entry(owner, now - Duration::days(30));
        riddle.unlock_mode = UnlockMode::Riddle;
        riddle.unlock_at = None;
        riddle.riddle_question = Some("what has an eye but cannot see?".into());
        riddle.riddle_answer_hash = Some(hash_answer("needle"));
        db.insert_entry(&riddle).unwrap();

        assert_eq!(run_unlock_pass(&db, &notifier, now).await.unwrap(), 0);
        let stored = db.get_entry(&riddle.id.to_string()).unwrap().unwrap();
        assert!(!stored.is_unlocked);
        assert!(db.list_notifications(&owner.to_string(), 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_abort_the_pass() {
        let db = open_temp_db();
        let notifier = notifier(&db);
        let owner = seed_user(&db);
        let now = Utc::now();

        // Owner row missing: the notification emit fails for this entry.
        let orphan = time_entry(Uuid::new_v4(), now - Duration::hours(2));
        let healthy = time_entry(owner, now - Duration::hours(1));
        db.insert_entry(&orphan).unwrap();
        db.insert_entry(&healthy).unwrap();

        let count = run_unlock_pass(&db, &notifier, now).await.unwrap();
        assert_eq!(count, 1, "only the healthy entry counts as processed");

        // The orphan still transitioned (persist precedes notify), the
        // healthy entry transitioned and was notified.
        assert!(db.get_entry(&orphan.id.to_string()).unwrap().unwrap().is_unlocked);
        assert!(db.get_entry(&healthy.id.to_string()).unwrap().unwrap().is_unlocked);
        assert_eq!(db.list_notifications(&owner.to_string(), 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookahead_reminds_only_next_day_window_without_unlocking() {
        let db = open_temp_db();
        let notifier = notifier(&db);
        let owner = seed_user(&db);
        let now = Utc.with_ymd_and_hms(2026, 8, 8, 15, 30, 0).unwrap();
        let midnight = next_utc_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2026, 8, 9, 0, 0, 0).unwrap());

        let tomorrow = time_entry(owner, midnight + Duration::hours(10));
        let later_tonight = time_entry(owner, now + Duration::hours(2));
        let next_week = time_entry(owner, midnight + Duration::days(5));
        for e in [&tomorrow, &later_tonight, &next_week] {
            db.insert_entry(e).unwrap();
        }

        assert_eq!(run_lookahead_pass(&db, &notifier, now).await.unwrap(), 1);

        let notifications = db.list_notifications(&owner.to_string(), 10).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationType::UnlockReminder);
        assert!(notifications[0].expires_at.is_some());

        // Unlock state untouched.
        assert!(!db.get_entry(&tomorrow.id.to_string()).unwrap().unwrap().is_unlocked);

        // Re-running reminds again: there is no dedup ledger.
        assert_eq!(run_lookahead_pass(&db, &notifier, now).await.unwrap(), 1);
        assert_eq!(db.list_notifications(&owner.to_string(), 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cleanup_prunes_only_expired_notifications() {
        let db = open_temp_db();
        let owner = seed_user(&db);
        let now = Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap();

        let make = |expires_at: Option<DateTime<Utc>>| Notification {
            id: Uuid::new_v4(),
            user_id: owner,
            kind: NotificationType::UnlockReminder,
            title: "reminder".into(),
            message: "soon".into(),
            data: serde_json::json!({}),
            is_read: false,
            read_at: None,
            expires_at,
            created_at: now - Duration::days(9),
        };
        db.insert_notification(&make(Some(now - Duration::days(1)))).unwrap();
        db.insert_notification(&make(Some(now + Duration::days(1)))).unwrap();
        db.insert_notification(&make(None)).unwrap();

        assert_eq!(run_cleanup_pass(&db, now).await.unwrap(), 1);
        assert_eq!(db.list_notifications(&owner.to_string(), 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scheduler_start_runs_a_pass_and_stop_halts_it() {
        let db = open_temp_db();
        let n = notifier(&db);
        let owner = seed_user(&db);
        let entry = time_entry(owner, Utc::now() - Duration::days(1));
        db.insert_entry(&entry).unwrap();

        // Long intervals: only the immediate first tick of each loop fires.
        let mut scheduler = Scheduler::new(db.clone(), n, SchedulerConfig::default());
        scheduler.start();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        scheduler.stop();

        assert!(db.get_entry(&entry.id.to_string()).unwrap().unwrap().is_unlocked);
        assert_eq!(db.list_notifications(&owner.to_string(), 10).unwrap().len(), 1);
    }
}
