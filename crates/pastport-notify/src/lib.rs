//! The notification emitter: writes the in-app notification record and,
//! for unlock events, sends a preference-gated email.
//!
//! The record write always happens first. Email is best-effort: transport
//! failures are logged and never surfaced to the caller, so an unlock
//! transition succeeds whether or not the mail goes out.

pub mod email;
pub mod templates;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use pastport_db::Database;
use pastport_db::models::UserRow;
use pastport_types::models::{Notification, NotificationPrefs, NotificationType};

use crate::email::{EmailProvider, SendOutcome};
use crate::templates::EmailContent;

/// Unlock-related email goes out only when the general flag and the
/// event-specific flag are both set.
pub fn wants_email(kind: NotificationType, prefs: &NotificationPrefs) -> bool {
    matches!(
        kind,
        NotificationType::CapsuleUnlocked | NotificationType::UnlockReminder
    ) && prefs.email_notifications
        && prefs.unlock_reminder_emails
}

pub struct Notifier {
    db: Arc<Database>,
    email: Arc<dyn EmailProvider>,
}

impl Notifier {
    pub fn new(db: Arc<Database>, email: Arc<dyn EmailProvider>) -> Self {
        Self { db, email }
    }

    /// Create a notification record for `recipient` and, for unlock
    /// events, email them if their preferences allow it.
    pub async fn emit(
        &self,
        recipient: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Result<Notification> {
        self.emit_expiring(recipient, kind, title, message, data, None)
            .await
    }

    /// Like [`emit`](Self::emit), with an expiry after which the cleanup
    /// pass may delete the record.
    pub async fn emit_expiring(
        &self,
        recipient: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
        data: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Notification> {
        let user = self
            .lookup_recipient(recipient)
            .await?
            .ok_or_else(|| anyhow!("notification recipient {} not found", recipient))?;

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: recipient,
            kind,
            title: title.to_string(),
            message: message.to_string(),
            data,
            is_read: false,
            read_at: None,
            expires_at,
            created_at: Utc::now(),
        };

        let db = self.db.clone();
        let record = notification.clone();
        tokio::task::spawn_blocking(move || db.insert_notification(&record))
            .await
            .context("notification insert task panicked")??;

        let prefs = NotificationPrefs {
            email_notifications: user.email_notifications,
            unlock_reminder_emails: user.unlock_reminder_emails,
        };
        if wants_email(kind, &prefs) {
            if let Some(address) = &user.email {
                let content = EmailContent::notification(title, message);
                match self
                    .email
                    .send(address, &content.subject, &content.html, &content.text)
                    .await
                {
                    Ok(SendOutcome::Sent { detail }) => {
                        debug!("Notification email to {} accepted: {}", address, detail);
                    }
                    Ok(SendOutcome::Skipped) => {
                        debug!("Email transport disabled, skipped mail to {}", address);
                    }
                    Err(e) => {
                        // Best-effort: the record above stands either way.
                        warn!("Notification email to {} failed: {}", address, e);
                    }
                }
            }
        }

        Ok(notification)
    }

    async fn lookup_recipient(&self, id: Uuid) -> Result<Option<UserRow>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.get_user_by_id(&id.to_string()))
            .await
            .context("recipient lookup task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        sent: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl EmailProvider for CountingProvider {
        async fn send(
            &self,
            _to: &str,
            _subject: &str,
            _html_body: &str,
            _text_body: &str,
        ) -> Result<SendOutcome, EmailError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EmailError::SendFailed("mailbox on fire".into()))
            } else {
                Ok(SendOutcome::Sent {
                    detail: "250".into(),
                })
            }
        }
    }

    fn open_temp_db() -> Arc<Database> {
        let path = std::env::temp_dir().join(format!("pastport-test-{}.db", Uuid::new_v4()));
        Arc::new(Database::open(&path).expect("open temp db"))
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

    #[test]
    fn unlock_events_gated_on_both_flags() {
        let on = NotificationPrefs {
            email_notifications: true,
            unlock_reminder_emails: true,
        };
        let general_off = NotificationPrefs {
            email_notifications: false,
            unlock_reminder_emails: true,
        };
        let specific_off = NotificationPrefs {
            email_notifications: true,
            unlock_reminder_emails: false,
        };

        assert!(wants_email(NotificationType::CapsuleUnlocked, &on));
        assert!(wants_email(NotificationType::UnlockReminder, &on));
        assert!(!wants_email(NotificationType::CapsuleUnlocked, &general_off));
        assert!(!wants_email(NotificationType::CapsuleUnlocked, &specific_off));
        assert!(!wants_email(NotificationType::System, &on));
    }

    #[tokio::test]
    async fn emit_writes_record_and_sends_email() {
        let db = open_temp_db();
        let provider = CountingProvider::new(false);
        let notifier = Notifier::new(db.clone(), provider.clone());
        let user = seed_user(&db, Some("owner@example.com"));

        let n = notifier
            .emit(
                user,
                NotificationType::CapsuleUnlocked,
                "Capsule unlocked",
                "Open it",
                serde_json::json!({"entry_id": Uuid::new_v4()}),
            )
            .await
            .unwrap();

        assert_eq!(provider.sent.load(Ordering::SeqCst), 1);
        let stored = db.get_notification(&n.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.user_id, user);
        assert!(!stored.is_read);
    }

    #[tokio::test]
    async fn email_pref_off_still_creates_record_without_email() {
        let db = open_temp_db();
        let provider = CountingProvider::new(false);
        let notifier = Notifier::new(db.clone(), provider.clone());
        let user = seed_user(&db, Some("owner@example.com"));
        db.update_prefs(
            &user.to_string(),
            NotificationPrefs {
                email_notifications: false,
                unlock_reminder_emails: true,
            },
        )
        .unwrap();

        let n = notifier
            .emit(
                user,
                NotificationType::CapsuleUnlocked,
                "Capsule unlocked",
                "Open it",
                serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(provider.sent.load(Ordering::SeqCst), 0);
        assert!(db.get_notification(&n.id.to_string()).unwrap().is_some());
    }

    #[tokio::test]
    async fn recipient_without_address_gets_record_only() {
        let db = open_temp_db();
        let provider = CountingProvider::new(false);
        let notifier = Notifier::new(db.clone(), provider.clone());
        let user = seed_user(&db, None);

        notifier
            .emit(
                user,
                NotificationType::UnlockReminder,
                "Unlocks tomorrow",
                "Soon",
                serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(provider.sent.load(Ordering::SeqCst), 0);
        assert_eq!(db.list_notifications(&user.to_string(), 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_failure_does_not_fail_emit() {
        let db = open_temp_db();
        let provider = CountingProvider::new(true);
        let notifier = Notifier::new(db.clone(), provider.clone());
        let user = seed_user(&db, Some("owner@example.com"));

        let result = notifier
            .emit(
                user,
                NotificationType::CapsuleUnlocked,
                "Capsule unlocked",
                "Open it",
                serde_json::json!({}),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(provider.sent.load(Ordering::SeqCst), 1);
        assert_eq!(db.list_notifications(&user.to_string(), 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_recipient_is_an_error() {
        let db = open_temp_db();
        let notifier = Notifier::new(db.clone(), CountingProvider::new(false));

        let result = notifier
            .emit(
                Uuid::new_v4(),
                NotificationType::CapsuleUnlocked,
                "Capsule unlocked",
                "Open it",
                serde_json::json!({}),
            )
            .await;

        assert!(result.is_err());
    }
}
