use rusqlite::ffi;
use uuid::Uuid;
use warbler_crypto::CryptoError;

/// Errors surfaced by the stores.
///
/// Constraint violations are classified from the SQLite extended result code,
/// so a duplicate follow or signup is reported as `DuplicateKey` whether it
/// came from this process or a concurrent writer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Empty password, oversized message, missing required field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unique or primary-key constraint violation.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Foreign-key target does not exist.
    #[error("reference error: {0}")]
    ReferenceError(String),

    #[error("requester does not own this record")]
    NotAuthorized,

    /// Failed login. Deliberately carries no detail about which check failed.
    #[error("invalid username or password")]
    NotAuthenticated,

    #[error("users may not follow themselves")]
    SelfFollowForbidden,

    #[error("users may not like their own messages")]
    SelfLikeForbidden,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("password hashing failed: {0}")]
    Hash(CryptoError),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let Some(code) = constraint_code(&err) else {
            return StoreError::Database(err);
        };

        let detail = err.to_string();
        match code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                StoreError::DuplicateKey(detail)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::ReferenceError(detail),
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                StoreError::InvalidInput(detail)
            }
            _ => StoreError::Database(err),
        }
    }
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EmptyPassword => StoreError::InvalidInput(err.to_string()),
            other => StoreError::Hash(other),
        }
    }
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ffi::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}
