use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::StoreResult;

pub const SCHEMA_VERSION: i64 = 1;

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// The version check and the DDL share one `BEGIN IMMEDIATE` transaction, so
/// processes opening a fresh file at the same time apply each step once.
pub fn run(conn: &mut Connection) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    if current_version(&tx)? < 1 {
        info!("Running migration v1 (users, messages, follows, likes)");
        tx.execute_batch(
            "
            CREATE TABLE users (
                id                BLOB PRIMARY KEY,
                email             TEXT NOT NULL UNIQUE CHECK (email <> ''),
                username          TEXT NOT NULL UNIQUE CHECK (username <> ''),
                image_url         TEXT NOT NULL,
                header_image_url  TEXT NOT NULL,
                bio               TEXT,
                location          TEXT,
                password          TEXT NOT NULL
            );

            CREATE TABLE messages (
                id         BLOB PRIMARY KEY,
                text       TEXT NOT NULL CHECK (length(text) <= 140),
                timestamp  TEXT NOT NULL,
                user_id    BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_messages_user
                ON messages(user_id, timestamp);

            CREATE TABLE follows (
                follower_id  BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                followee_id  BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (follower_id, followee_id)
            );

            CREATE INDEX idx_follows_followee
                ON follows(followee_id);

            CREATE TABLE likes (
                user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id  BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, message_id)
            );

            CREATE INDEX idx_likes_message
                ON likes(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    let version = current_version(&tx)?;
    tx.commit()?;

    info!("Database schema at v{}", version);
    Ok(())
}

pub fn current_version(conn: &Connection) -> StoreResult<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
