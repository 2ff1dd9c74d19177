use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                username                TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                email                   TEXT,
                email_notifications     INTEGER NOT NULL DEFAULT 1,
                unlock_reminder_emails  INTEGER NOT NULL DEFAULT 1,
                created_at              TEXT NOT NULL
            );

            CREATE TABLE entries (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL,
                kind                TEXT NOT NULL,
                title               TEXT NOT NULL,
                emoji               TEXT,
                content             TEXT NOT NULL,
                media_refs          TEXT NOT NULL DEFAULT '[]',
                unlock_mode         TEXT NOT NULL,
                unlock_at           TEXT,
                riddle_question     TEXT,
                riddle_answer_hash  TEXT,
                is_unlocked         INTEGER NOT NULL DEFAULT 0,
                unlocked_at         TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_entries_owner
                ON entries(user_id, created_at);

            -- Serves the hourly unlock pass and the daily look-ahead pass.
            CREATE INDEX idx_entries_due
                ON entries(unlock_mode, is_unlocked, unlock_at);

            -- No foreign key to entries: notifications outlive the entry
            -- they reference and may dangle after deletion.
            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                type        TEXT NOT NULL,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                data        TEXT NOT NULL DEFAULT '{}',
                is_read     INTEGER NOT NULL DEFAULT 0,
                read_at     TEXT,
                expires_at  TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_recipient
                ON notifications(user_id, created_at);

            CREATE INDEX idx_notifications_expiry
                ON notifications(expires_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
