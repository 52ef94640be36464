use crate::Database;
use crate::models::{ChannelRow, MessageRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Channels --

    pub fn create_channel(
        &self,
        id: &str,
        org_id: &str,
        name: &str,
        project_id: Option<&str>,
        creator_id: &str,
        members: &[String],
        is_private: bool,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO channels (id, org_id, name, project_id, creator_id, is_private, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, org_id, name, project_id, creator_id, is_private, created_at],
            )?;
            for user_id in members {
                tx.execute(
                    "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                    (id, user_id),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| query_channel(conn, id))
    }

    /// Non-deleted channels in the org that the user is a member of, plus
    /// public ones.
    pub fn list_channels(&self, org_id: &str, user_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM channels
                 WHERE org_id = ?1 AND is_deleted = 0
                   AND (is_private = 0 OR EXISTS (
                        SELECT 1 FROM channel_members cm
                        WHERE cm.channel_id = channels.id AND cm.user_id = ?2))
                 ORDER BY created_at",
            )?;
            let ids = stmt
                .query_map((org_id, user_id), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut rows = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(row) = query_channel(conn, id)? {
                    rows.push(row);
                }
            }
            Ok(rows)
        })
    }

    /// Full-row update; callers resolve the patch against the current row
    /// first (last-write-wins, no versioning).
    pub fn update_channel(
        &self,
        id: &str,
        name: &str,
        project_id: Option<&str>,
        is_private: bool,
        members: Option<&[String]>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE channels SET name = ?2, project_id = ?3, is_private = ?4 WHERE id = ?1",
                rusqlite::params![id, name, project_id, is_private],
            )?;
            if let Some(members) = members {
                tx.execute("DELETE FROM channel_members WHERE channel_id = ?1", [id])?;
                for user_id in members {
                    tx.execute(
                        "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                        (id, user_id),
                    )?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Soft delete. Returns false if the channel was missing or already
    /// deleted — deletion is irreversible and never repeated.
    pub fn soft_delete_channel(&self, id: &str, by_user_id: &str, at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE channels SET is_deleted = 1, deleted_by = ?2, deleted_at = ?3
                 WHERE id = ?1 AND is_deleted = 0",
                rusqlite::params![id, by_user_id, at],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    /// Append a message, assigning the next per-channel sequence number and
    /// seeding the read-by set with the sender, all in one transaction.
    /// Returns the assigned sequence number.
    pub fn insert_message(
        &self,
        id: &str,
        channel_id: &str,
        sender_id: &str,
        sender_name: &str,
        body: &str,
        reply_to: Option<&str>,
        created_at: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE channel_id = ?1",
                [channel_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO messages (id, channel_id, seq, sender_id, sender_name, body, reply_to, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, channel_id, seq, sender_id, sender_name, body, reply_to, created_at],
            )?;
            tx.execute(
                "INSERT INTO message_reads (message_id, user_id) VALUES (?1, ?2)",
                (id, sender_id),
            )?;
            tx.commit()?;
            Ok(seq)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Newest messages first; pass `before` (a created_at cursor) to page
    /// into older history.
    pub fn list_messages(
        &self,
        channel_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel_id, seq, sender_id, sender_name, body, reply_to, edited, deleted, created_at
                 FROM messages
                 WHERE channel_id = ?1 AND (?2 IS NULL OR created_at < ?2)
                 ORDER BY seq DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![channel_id, before, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_message_body(&self, id: &str, body: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET body = ?2, edited = 1 WHERE id = ?1",
                (id, body),
            )?;
            Ok(())
        })
    }

    /// Tombstone: the row stays (identity, ordering, read state), the body
    /// is cleared.
    pub fn tombstone_message(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET deleted = 1, body = '' WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    // -- Read state --

    /// Add the user to the read-by set of every message in the channel they
    /// have not read and did not send. Returns how many were newly marked;
    /// naturally idempotent.
    pub fn mark_read(&self, channel_id: &str, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO message_reads (message_id, user_id)
                 SELECT m.id, ?2 FROM messages m
                 WHERE m.channel_id = ?1 AND m.sender_id != ?2
                   AND NOT EXISTS (SELECT 1 FROM message_reads r
                                   WHERE r.message_id = m.id AND r.user_id = ?2)",
                (channel_id, user_id),
            )?;
            Ok(changed as u64)
        })
    }

    /// Batch-fetch read-by sets for a page of messages.
    pub fn reads_for_messages(&self, message_ids: &[String]) -> Result<Vec<(String, String)>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, user_id FROM message_reads WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full re-scan: count messages the user can see, did not send, and has
    /// not read, across non-deleted accessible channels in the org.
    pub fn unread_count(&self, org_id: &str, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM messages m
                 JOIN channels c ON m.channel_id = c.id
                 WHERE c.org_id = ?1
                   AND c.is_deleted = 0
                   AND m.deleted = 0
                   AND m.sender_id != ?2
                   AND (c.is_private = 0 OR EXISTS (
                        SELECT 1 FROM channel_members cm
                        WHERE cm.channel_id = c.id AND cm.user_id = ?2))
                   AND NOT EXISTS (SELECT 1 FROM message_reads r
                                   WHERE r.message_id = m.id AND r.user_id = ?2)",
                (org_id, user_id),
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_channel(conn: &Connection, id: &str) -> Result<Option<ChannelRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, org_id, name, project_id, creator_id, is_private, is_deleted,
                deleted_by, deleted_at, created_at
         FROM channels WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(ChannelRow {
                id: row.get(0)?,
                org_id: row.get(1)?,
                name: row.get(2)?,
                project_id: row.get(3)?,
                creator_id: row.get(4)?,
                is_private: row.get(5)?,
                is_deleted: row.get(6)?,
                deleted_by: row.get(7)?,
                deleted_at: row.get(8)?,
                created_at: row.get(9)?,
                members: vec![],
            })
        })
        .optional()?;

    let Some(mut row) = row else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT user_id FROM channel_members WHERE channel_id = ?1 ORDER BY user_id")?;
    row.members = stmt
        .query_map([id], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(row))
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, channel_id, seq, sender_id, sender_name, body, reply_to, edited, deleted, created_at
         FROM messages WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], map_message).optional()?;
    Ok(row)
}

fn map_message(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        seq: row.get(2)?,
        sender_id: row.get(3)?,
        sender_name: row.get(4)?,
        body: row.get(5)?,
        reply_to: row.get(6)?,
        edited: row.get(7)?,
        deleted: row.get(8)?,
        created_at: row.get(9)?,
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
    use crate::Database;

    fn seeded() -> (Database, String, String, String) {
        let db = Database::open_in_memory().unwrap();
        let org = "org-1".to_string();
        let alice = "alice".to_string();
        let bob = "bob".to_string();
        db.create_channel(
            "chan-1",
            &org,
            "general",
            None,
            &alice,
            &[alice.clone(), bob.clone()],
            false,
            "2026-01-01T00:00:00Z",
        )
        .unwrap();
        (db, org, alice, bob)
    }

    #[test]
    fn sequence_numbers_are_per_channel_and_dense() {
        let (db, org, alice, _) = seeded();
        db.create_channel(
            "chan-2",
            &org,
            "random",
            None,
            &alice,
            &[alice.clone()],
            false,
            "2026-01-01T00:00:00Z",
        )
        .unwrap();

        let s1 = db
            .insert_message("m1", "chan-1", &alice, "Alice", "one", None, "2026-01-01T00:00:01Z")
            .unwrap();
        let s2 = db
            .insert_message("m2", "chan-1", &alice, "Alice", "two", None, "2026-01-01T00:00:02Z")
            .unwrap();
        let other = db
            .insert_message("m3", "chan-2", &alice, "Alice", "elsewhere", None, "2026-01-01T00:00:03Z")
            .unwrap();

        assert_eq!((s1, s2), (1, 2));
        assert_eq!(other, 1);
    }

    #[test]
    fn new_message_is_read_by_sender_only() {
        let (db, _, alice, _) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();

        let reads = db.reads_for_messages(&["m1".to_string()]).unwrap();
        assert_eq!(reads, vec![("m1".to_string(), alice)]);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (db, _, alice, bob) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();
        db.insert_message("m2", "chan-1", &alice, "Alice", "again", None, "2026-01-01T00:00:02Z")
            .unwrap();

        assert_eq!(db.mark_read("chan-1", &bob).unwrap(), 2);
        assert_eq!(db.mark_read("chan-1", &bob).unwrap(), 0);
    }

    #[test]
    fn mark_read_skips_own_messages() {
        let (db, _, alice, _) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();

        assert_eq!(db.mark_read("chan-1", &alice).unwrap(), 0);
    }

    #[test]
    fn unread_count_excludes_sender_read_and_private_nonmember() {
        let (db, org, alice, bob) = seeded();
        // Private channel bob is not a member of
        db.create_channel(
            "chan-secret",
            &org,
            "secret",
            None,
            &alice,
            &[alice.clone()],
            true,
            "2026-01-01T00:00:00Z",
        )
        .unwrap();

        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();
        db.insert_message("m2", "chan-1", &bob, "Bob", "yo", None, "2026-01-01T00:00:02Z")
            .unwrap();
        db.insert_message("m3", "chan-secret", &alice, "Alice", "psst", None, "2026-01-01T00:00:03Z")
            .unwrap();

        // Bob: alice's public message only — not his own, not the private one
        assert_eq!(db.unread_count(&org, &bob).unwrap(), 1);
        // Alice sees bob's message plus nothing from her own
        assert_eq!(db.unread_count(&org, &alice).unwrap(), 1);

        db.mark_read("chan-1", &bob).unwrap();
        assert_eq!(db.unread_count(&org, &bob).unwrap(), 0);
    }

    #[test]
    fn unread_count_ignores_soft_deleted_channels_and_tombstones() {
        let (db, org, alice, bob) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();
        db.insert_message("m2", "chan-1", &alice, "Alice", "oops", None, "2026-01-01T00:00:02Z")
            .unwrap();

        db.tombstone_message("m2").unwrap();
        assert_eq!(db.unread_count(&org, &bob).unwrap(), 1);

        assert!(db.soft_delete_channel("chan-1", &alice, "2026-01-02T00:00:00Z").unwrap());
        assert_eq!(db.unread_count(&org, &bob).unwrap(), 0);
    }

    #[test]
    fn soft_delete_is_once_only_and_keeps_history() {
        let (db, _, alice, _) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();

        assert!(db.soft_delete_channel("chan-1", &alice, "2026-01-02T00:00:00Z").unwrap());
        assert!(!db.soft_delete_channel("chan-1", &alice, "2026-01-03T00:00:00Z").unwrap());

        let chan = db.get_channel("chan-1").unwrap().unwrap();
        assert!(chan.is_deleted);
        assert_eq!(chan.deleted_by.as_deref(), Some("alice"));
        // History stays readable
        assert_eq!(db.list_messages("chan-1", 50, None).unwrap().len(), 1);
    }

    #[test]
    fn list_channels_hides_private_nonmember_and_deleted() {
        let (db, org, alice, bob) = seeded();
        db.create_channel(
            "chan-secret",
            &org,
            "secret",
            None,
            &alice,
            &[alice.clone()],
            true,
            "2026-01-01T00:00:01Z",
        )
        .unwrap();
        db.create_channel(
            "chan-dead",
            &org,
            "dead",
            None,
            &alice,
            &[alice.clone(), bob.clone()],
            false,
            "2026-01-01T00:00:02Z",
        )
        .unwrap();
        db.soft_delete_channel("chan-dead", &alice, "2026-01-02T00:00:00Z")
            .unwrap();

        let bobs: Vec<String> = db
            .list_channels(&org, &bob)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(bobs, vec!["chan-1".to_string()]);

        let alices: Vec<String> = db
            .list_channels(&org, &alice)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(alices, vec!["chan-1".to_string(), "chan-secret".to_string()]);
    }

    #[test]
    fn list_messages_pages_newest_first() {
        let (db, _, alice, _) = seeded();
        for i in 1..=5 {
            db.insert_message(
                &format!("m{}", i),
                "chan-1",
                &alice,
                "Alice",
                &format!("msg {}", i),
                None,
                &format!("2026-01-01T00:00:0{}Z", i),
            )
            .unwrap();
        }

        let page = db.list_messages("chan-1", 2, None).unwrap();
        assert_eq!(page[0].seq, 5);
        assert_eq!(page[1].seq, 4);

        let older = db
            .list_messages("chan-1", 10, Some(&page[1].created_at))
            .unwrap();
        assert_eq!(older.len(), 3);
        assert_eq!(older[0].seq, 3);
    }

    #[test]
    fn edit_and_tombstone_flags() {
        let (db, _, alice, _) = seeded();
        db.insert_message("m1", "chan-1", &alice, "Alice", "hi", None, "2026-01-01T00:00:01Z")
            .unwrap();

        db.set_message_body("m1", "hello").unwrap();
        let row = db.get_message("m1").unwrap().unwrap();
        assert!(row.edited);
        assert_eq!(row.body, "hello");

        db.tombstone_message("m1").unwrap();
        let row = db.get_message("m1").unwrap().unwrap();
        assert!(row.deleted);
        assert_eq!(row.body, "");
    }
}
