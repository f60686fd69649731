use crate::Database;
use crate::models::{
    ConversationListRow, ConversationRow, MessageRow, NotificationRow, UserRow,
};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Normalized lookup key for the unordered participant pair: the
/// lexicographically smaller id always comes first.
pub fn pair_key(user_x: &str, user_y: &str) -> String {
    let (a, b) = normalize_pair(user_x, user_y);
    format!("{}:{}", a, b)
}

fn normalize_pair<'a>(user_x: &'a str, user_y: &'a str) -> (&'a str, &'a str) {
    if user_x <= user_y {
        (user_x, user_y)
    } else {
        (user_y, user_x)
    }
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        profile_pic: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, profile_pic) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, profile_pic),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Conversations --

    /// Find the conversation for the unordered pair, creating it if absent.
    /// `id` is used only when a new row is created.
    ///
    /// Creation is guarded by the UNIQUE pair_key: a racing writer that
    /// sneaks in between our read and insert makes the insert fail with a
    /// constraint violation, which we treat as "already exists, re-fetch".
    pub fn find_or_create_conversation(
        &self,
        id: &str,
        user_x: &str,
        user_y: &str,
    ) -> Result<ConversationRow> {
        let (a, b) = normalize_pair(user_x, user_y);
        let key = pair_key(user_x, user_y);

        self.with_conn(|conn| {
            if let Some(row) = query_conversation_by_pair(conn, &key)? {
                return Ok(row);
            }

            let inserted = conn.execute(
                "INSERT INTO conversations (id, pair_key, participant_a, participant_b)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, key, a, b],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
                Err(e) => return Err(e.into()),
            }

            query_conversation_by_pair(conn, &key)?
                .ok_or_else(|| anyhow!("conversation missing after insert for pair {}", key))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, participant_a, participant_b, last_message_text,
                        last_message_sender, last_message_seen, last_activity_at, created_at
                 FROM conversations WHERE id = ?1",
            )?;
            stmt.query_row([id], map_conversation_row).optional()
        })
    }

    /// All conversations `user_id` participates in, newest activity first,
    /// with both participants' public profiles joined in one query.
    pub fn list_conversations_for(&self, user_id: &str) -> Result<Vec<ConversationListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.participant_a, c.participant_b,
                        ua.username, ua.profile_pic,
                        ub.username, ub.profile_pic,
                        c.last_message_text, c.last_message_sender, c.last_message_seen,
                        c.last_activity_at, c.created_at
                 FROM conversations c
                 LEFT JOIN users ua ON ua.id = c.participant_a
                 LEFT JOIN users ub ON ub.id = c.participant_b
                 WHERE c.participant_a = ?1 OR c.participant_b = ?1
                 ORDER BY c.last_activity_at DESC, c.created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationListRow {
                        id: row.get(0)?,
                        participant_a: row.get(1)?,
                        participant_b: row.get(2)?,
                        a_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        a_profile_pic: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        b_username: row
                            .get::<_, Option<String>>(5)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        b_profile_pic: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        last_message_text: row.get(7)?,
                        last_message_sender: row.get(8)?,
                        last_message_seen: row.get(9)?,
                        last_activity_at: row.get(10)?,
                        created_at: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Append a message and overwrite the conversation's denormalized
    /// last-message summary in one transaction. Returns the inserted row
    /// with its DB-assigned timestamp.
    pub fn append_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, text, media_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, conversation_id, sender_id, text, media_url],
            )?;

            // Overwrite, not merge: the summary always reflects the newest message.
            tx.execute(
                "UPDATE conversations
                 SET last_message_text = ?2,
                     last_message_sender = ?3,
                     last_message_seen = 0,
                     last_activity_at = (SELECT created_at FROM messages WHERE id = ?4)
                 WHERE id = ?1",
                rusqlite::params![conversation_id, text.unwrap_or(""), sender_id, id],
            )?;

            let row = tx.query_row(
                "SELECT id, conversation_id, sender_id, text, media_url, seen, created_at
                 FROM messages WHERE id = ?1",
                [id],
                map_message_row,
            )?;

            tx.commit()?;
            Ok(row)
        })
    }

    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, text, media_url, seen, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;

            let rows = stmt
                .query_map([conversation_id], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Flip seen on every message in the conversation not authored by the
    /// viewer. The UPDATE is scoped to rows existing at call time, so a
    /// message appended afterwards starts unseen regardless of interleaving.
    /// Idempotent; returns the number of rows actually flipped.
    pub fn mark_messages_seen(&self, conversation_id: &str, viewer_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE messages SET seen = 1
                 WHERE conversation_id = ?1 AND sender_id <> ?2 AND seen = 0",
                rusqlite::params![conversation_id, viewer_id],
            )?;

            tx.execute(
                "UPDATE conversations SET last_message_seen = 1 WHERE id = ?1",
                [conversation_id],
            )?;

            tx.commit()?;
            Ok(changed)
        })
    }

    // -- Notifications --

    pub fn insert_notification(
        &self,
        id: &str,
        recipient_id: &str,
        sender_id: &str,
        kind: &str,
        related_post_id: Option<&str>,
        message: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, sender_id, kind, related_post_id, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, recipient_id, sender_id, kind, related_post_id, message],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications_for(&self, recipient_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.recipient_id, n.sender_id, u.username, u.profile_pic,
                        n.kind, n.related_post_id, n.message, n.is_read, n.created_at
                 FROM notifications n
                 LEFT JOIN users u ON u.id = n.sender_id
                 WHERE n.recipient_id = ?1
                 ORDER BY n.created_at DESC, n.rowid DESC",
            )?;

            let rows = stmt
                .query_map([recipient_id], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        recipient_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        sender_profile_pic: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        kind: row.get(5)?,
                        related_post_id: row.get(6)?,
                        message: row.get(7)?,
                        is_read: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Idempotent false→true flip. Returns false only when the id is unknown;
    /// re-marking an already-read notification still counts as matched.
    pub fn mark_notification_read(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, profile_pic, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            profile_pic: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

fn query_conversation_by_pair(conn: &Connection, key: &str) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, participant_a, participant_b, last_message_text,
                last_message_sender, last_message_seen, last_activity_at, created_at
         FROM conversations WHERE pair_key = ?1",
    )?;
    stmt.query_row([key], map_conversation_row).optional()
}

fn map_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        last_message_text: row.get(3)?,
        last_message_sender: row.get(4)?,
        last_message_seen: row.get(5)?,
        last_activity_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        media_url: row.get(4)?,
        seen: row.get(5)?,
        created_at: row.get(6)?,
    })
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

    fn open_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("test.db")).expect("open db");
        (db, dir)
    }

    fn seed_user(db: &Database, id: &str, username: &str) {
        db.create_user(id, username, "hash", "").expect("create user");
    }

    #[test]
    fn conversation_pair_is_unique_regardless_of_order() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");

        let first = db
            .find_or_create_conversation("conv-1", "alice", "bob")
            .unwrap();
        let second = db
            .find_or_create_conversation("conv-2", "bob", "alice")
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, "conv-1");
        assert_eq!(db.list_conversations_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn constraint_violation_resolves_to_existing_row() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");

        // Simulate the racing writer: the pair row appears between the
        // caller's read and insert.
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, pair_key, participant_a, participant_b)
                 VALUES ('conv-race', ?1, 'alice', 'bob')",
                [pair_key("alice", "bob")],
            )?;
            Ok(())
        })
        .unwrap();

        let resolved = db
            .find_or_create_conversation("conv-lost", "bob", "alice")
            .unwrap();
        assert_eq!(resolved.id, "conv-race");
    }

    #[test]
    fn append_message_overwrites_summary() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");
        let conv = db
            .find_or_create_conversation("conv-1", "alice", "bob")
            .unwrap();

        db.append_message("m1", &conv.id, "alice", Some("hi"), None)
            .unwrap();
        db.append_message("m2", &conv.id, "bob", Some("hello"), None)
            .unwrap();

        let updated = db.get_conversation(&conv.id).unwrap().unwrap();
        assert_eq!(updated.last_message_text, "hello");
        assert_eq!(updated.last_message_sender.as_deref(), Some("bob"));
        assert!(!updated.last_message_seen);
        assert_eq!(updated.last_activity_at, db.list_messages(&conv.id).unwrap()[0].created_at);
    }

    #[test]
    fn messages_list_newest_first() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");
        let conv = db
            .find_or_create_conversation("conv-1", "alice", "bob")
            .unwrap();

        for (id, text) in [("m1", "one"), ("m2", "two"), ("m3", "three")] {
            db.append_message(id, &conv.id, "alice", Some(text), None)
                .unwrap();
        }

        let ids: Vec<String> = db
            .list_messages(&conv.id)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["m3", "m2", "m1"]);
    }

    #[test]
    fn mark_seen_is_idempotent_and_scoped_to_existing_rows() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");
        let conv = db
            .find_or_create_conversation("conv-1", "alice", "bob")
            .unwrap();

        db.append_message("m1", &conv.id, "alice", Some("hi"), None)
            .unwrap();
        db.append_message("m2", &conv.id, "alice", Some("there"), None)
            .unwrap();
        db.append_message("m3", &conv.id, "bob", Some("yo"), None)
            .unwrap();

        // Bob marks seen: only alice's messages flip.
        assert_eq!(db.mark_messages_seen(&conv.id, "bob").unwrap(), 2);
        assert_eq!(db.mark_messages_seen(&conv.id, "bob").unwrap(), 0);

        let by_id = |id: &str| {
            db.list_messages(&conv.id)
                .unwrap()
                .into_iter()
                .find(|m| m.id == id)
                .unwrap()
        };
        assert!(by_id("m1").seen);
        assert!(by_id("m2").seen);
        assert!(!by_id("m3").seen);

        // A message appended after the mark starts unseen; earlier flips hold.
        db.append_message("m4", &conv.id, "alice", Some("later"), None)
            .unwrap();
        assert!(!by_id("m4").seen);
        assert!(by_id("m1").seen);
    }

    #[test]
    fn notifications_list_newest_first_and_read_flips_once() {
        let (db, _dir) = open_test_db();
        seed_user(&db, "alice", "alice");
        seed_user(&db, "bob", "bob");

        db.insert_notification("n1", "bob", "alice", "like", Some("post-1"), "alice liked your post")
            .unwrap();
        db.insert_notification("n2", "bob", "alice", "follow", None, "alice started following you")
            .unwrap();

        let rows = db.list_notifications_for("bob").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "n2");
        assert!(rows.iter().all(|n| !n.is_read));
        assert_eq!(rows[0].sender_username, "alice");

        assert!(db.mark_notification_read("n1").unwrap());
        assert!(db.mark_notification_read("n1").unwrap());
        assert!(!db.mark_notification_read("missing").unwrap());

        let rows = db.list_notifications_for("bob").unwrap();
        assert!(rows.iter().find(|n| n.id == "n1").unwrap().is_read);
        assert!(!rows.iter().find(|n| n.id == "n2").unwrap().is_read);
    }
}
