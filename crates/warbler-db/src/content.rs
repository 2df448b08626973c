//! Messages ("warbles"), each owned by exactly one user.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;
use uuid::Uuid;
use warbler_types::{MAX_MESSAGE_LEN, Message};

use crate::error::{StoreError, StoreResult};
use crate::models::{self, MESSAGE_COLUMNS, message_from_row};

/// Stage a new message for `user_id`, timestamped now.
pub fn post(tx: &Transaction<'_>, user_id: Uuid, text: &str) -> StoreResult<Message> {
    validate_text(text)?;

    let message = Message {
        id: Uuid::new_v4(),
        text: text.to_string(),
        timestamp: Utc::now(),
        user_id,
    };

    tx.execute(
        "INSERT INTO messages (id, text, timestamp, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![message.id, message.text, message.timestamp, message.user_id],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::ReferenceError(_) => {
            StoreError::InvalidInput(format!("unknown user {user_id}"))
        }
        other => other,
    })?;

    debug!(message_id = %message.id, user_id = %user_id, "Message posted");
    Ok(message)
}

/// Delete a message on behalf of `requester_id`, who must own it.
pub fn delete(tx: &Transaction<'_>, message_id: Uuid, requester_id: Uuid) -> StoreResult<()> {
    let owner = owner_of(tx, message_id)?.ok_or(StoreError::NotFound {
        entity: "message",
        id: message_id,
    })?;

    if owner != requester_id {
        return Err(StoreError::NotAuthorized);
    }

    tx.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;

    debug!(message_id = %message_id, "Message deleted");
    Ok(())
}

pub fn get_message(conn: &Connection, id: Uuid) -> StoreResult<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1");
    Ok(conn.query_row(&sql, [id], message_from_row).optional()?)
}

/// All messages by `user_id`, newest first.
pub fn messages_by_user(conn: &Connection, user_id: Uuid) -> StoreResult<Vec<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         WHERE m.user_id = ?1
         ORDER BY m.timestamp DESC, m.rowid DESC"
    );
    models::query_messages(conn, &sql, [user_id])
}

pub fn message_count(conn: &Connection, user_id: Uuid) -> StoreResult<u64> {
    models::count(
        conn,
        "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
        [user_id],
    )
}

/// Has `user_id` liked `message_id`?
pub fn is_liked_by(conn: &Connection, message_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
    models::exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM likes WHERE message_id = ?1 AND user_id = ?2)",
        params![message_id, user_id],
    )
}

pub(crate) fn owner_of(conn: &Connection, message_id: Uuid) -> StoreResult<Option<Uuid>> {
    Ok(conn
        .query_row(
            "SELECT user_id FROM messages WHERE id = ?1",
            [message_id],
            |r| r.get(0),
        )
        .optional()?)
}

fn validate_text(text: &str) -> StoreResult<()> {
    if text.is_empty() {
        return Err(StoreError::InvalidInput("message text must not be empty".into()));
    }

    let len = text.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(StoreError::InvalidInput(format!(
            "message text is {len} characters, limit is {MAX_MESSAGE_LEN}"
        )));
    }
    Ok(())
}
