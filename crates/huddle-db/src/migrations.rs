use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            org_id      TEXT NOT NULL,
            name        TEXT NOT NULL,
            project_id  TEXT,
            creator_id  TEXT NOT NULL,
            is_private  INTEGER NOT NULL DEFAULT 0,
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            deleted_by  TEXT,
            deleted_at  TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_channels_org
            ON channels(org_id, is_deleted);

        CREATE TABLE IF NOT EXISTS channel_members (
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            user_id     TEXT NOT NULL,
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            seq         INTEGER NOT NULL,
            sender_id   TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            body        TEXT NOT NULL,
            reply_to    TEXT REFERENCES messages(id),
            edited      INTEGER NOT NULL DEFAULT 0,
            deleted     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (channel_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, seq);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reads_user
            ON message_reads(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
