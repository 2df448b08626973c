//! Directed follower → followee edges.

use rusqlite::{Connection, Transaction, params};
use tracing::debug;
use uuid::Uuid;
use warbler_types::{Follow, User};

use crate::error::{StoreError, StoreResult};
use crate::models::{self, USER_COLUMNS};

/// Stage a follow edge. A repeat follow is `DuplicateKey`, an unknown user
/// on either side is `ReferenceError`.
pub fn follow(
    tx: &Transaction<'_>,
    follower_id: Uuid,
    followee_id: Uuid,
) -> StoreResult<Follow> {
    if follower_id == followee_id {
        return Err(StoreError::SelfFollowForbidden);
    }

    tx.execute(
        "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
        params![follower_id, followee_id],
    )?;

    debug!(follower = %follower_id, followee = %followee_id, "Follow added");
    Ok(Follow {
        follower_id,
        followee_id,
    })
}

/// Remove a follow edge. Returns whether one existed; a missing edge is not an error.
pub fn unfollow(
    tx: &Transaction<'_>,
    follower_id: Uuid,
    followee_id: Uuid,
) -> StoreResult<bool> {
    let removed = tx.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, followee_id],
    )? > 0;

    if removed {
        debug!(follower = %follower_id, followee = %followee_id, "Follow removed");
    }
    Ok(removed)
}

/// Does `user_id` follow `other_id`?
pub fn is_following(conn: &Connection, user_id: Uuid, other_id: Uuid) -> StoreResult<bool> {
    models::exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
        params![user_id, other_id],
    )
}

/// Is `user_id` followed by `other_id`?
pub fn is_followed_by(conn: &Connection, user_id: Uuid, other_id: Uuid) -> StoreResult<bool> {
    is_following(conn, other_id, user_id)
}

/// Users following `user_id`, ordered by username.
pub fn followers(conn: &Connection, user_id: Uuid) -> StoreResult<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM follows f
         JOIN users u ON u.id = f.follower_id
         WHERE f.followee_id = ?1
         ORDER BY u.username"
    );
    models::query_users(conn, &sql, [user_id])
}

/// Users `user_id` follows, ordered by username.
pub fn following(conn: &Connection, user_id: Uuid) -> StoreResult<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS}
         FROM follows f
         JOIN users u ON u.id = f.followee_id
         WHERE f.follower_id = ?1
         ORDER BY u.username"
    );
    models::query_users(conn, &sql, [user_id])
}

pub fn follower_count(conn: &Connection, user_id: Uuid) -> StoreResult<u64> {
    models::count(
        conn,
        "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
        [user_id],
    )
}

pub fn following_count(conn: &Connection, user_id: Uuid) -> StoreResult<u64> {
    models::count(
        conn,
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
        [user_id],
    )
}
