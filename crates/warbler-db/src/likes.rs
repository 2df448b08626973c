//! Users liking messages.

use rusqlite::{Connection, Transaction, params};
use tracing::debug;
use uuid::Uuid;
use warbler_types::{Like, Message, User};

use crate::content;
use crate::error::{StoreError, StoreResult};
use crate::models::{self, MESSAGE_COLUMNS, USER_COLUMNS};

/// Stage a like. Users may not like their own messages.
pub fn like(tx: &Transaction<'_>, user_id: Uuid, message_id: Uuid) -> StoreResult<Like> {
    let owner = content::owner_of(tx, message_id)?
        .ok_or_else(|| StoreError::ReferenceError(format!("unknown message {message_id}")))?;

    if owner == user_id {
        return Err(StoreError::SelfLikeForbidden);
    }

    tx.execute(
        "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
        params![user_id, message_id],
    )?;

    debug!(user_id = %user_id, message_id = %message_id, "Like added");
    Ok(Like {
        user_id,
        message_id,
    })
}

/// Remove a like. Returns whether one existed; a missing like is not an error.
pub fn unlike(tx: &Transaction<'_>, user_id: Uuid, message_id: Uuid) -> StoreResult<bool> {
    let removed = tx.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
    )? > 0;

    if removed {
        debug!(user_id = %user_id, message_id = %message_id, "Like removed");
    }
    Ok(removed)
}

/// Flip the like state: removes it if present, adds it if not.
/// Returns `true` when the message is liked afterwards.
pub fn toggle_like(tx: &Transaction<'_>, user_id: Uuid, message_id: Uuid) -> StoreResult<bool> {
    if unlike(tx, user_id, message_id)? {
        return Ok(false);
    }
    like(tx, user_id, message_id)?;
    Ok(true)
}

/// Messages `user_id` has liked, newest first.
pub fn liked_messages(conn: &Connection, user_id: Uuid) -> StoreResult<Vec<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM likes l
         JOIN messages m ON m.id = l.message_id
         WHERE l.user_id = ?1
         ORDER BY m.timestamp DESC, m.rowid DESC"
    );
    models::query_messages(conn, &sql, [user_id])
}

/// Users who liked `message_id`, ordered by username.
pub fn likers(conn: &Connection, message_id: Uuid) -> StoreResult<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM likes l
         JOIN users u ON u.id = l.user_id
         WHERE l.message_id = ?1
         ORDER BY u.username"
    );
    models::query_users(conn, &sql, [message_id])
}

pub fn like_count(conn: &Connection, message_id: Uuid) -> StoreResult<u64> {
    models::count(
        conn,
        "SELECT COUNT(*) FROM likes WHERE message_id = ?1",
        [message_id],
    )
}
