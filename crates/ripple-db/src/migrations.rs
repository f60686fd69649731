use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    // Message/conversation/notification timestamps use millisecond strftime
    // so same-second rows stay totally ordered.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            profile_pic TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id                  TEXT PRIMARY KEY,
            -- normalized '{min}:{max}' of the two participant ids; the UNIQUE
            -- constraint is what makes concurrent creation collapse to one row
            pair_key            TEXT NOT NULL UNIQUE,
            participant_a       TEXT NOT NULL REFERENCES users(id),
            participant_b       TEXT NOT NULL REFERENCES users(id),
            last_message_text   TEXT NOT NULL DEFAULT '',
            last_message_sender TEXT REFERENCES users(id),
            last_message_seen   INTEGER NOT NULL DEFAULT 1,
            last_activity_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now')),
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_participants
            ON conversations(participant_a, participant_b);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT,
            media_url       TEXT,
            seen            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            recipient_id    TEXT NOT NULL REFERENCES users(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            kind            TEXT NOT NULL,
            related_post_id TEXT,
            message         TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
