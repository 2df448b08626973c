use std::sync::OnceLock;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{info, warn};
use uuid::Uuid;
use warbler_crypto::CredentialHasher;
use warbler_types::{NewUser, ProfileDefaults, ProfileUpdate, User};

use crate::error::{StoreError, StoreResult};
use crate::models::{USER_COLUMNS, user_from_row};

// Well-formed Argon2id hash that matches no password. Used only if the
// random decoy cannot be produced.
const FALLBACK_DECOY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Signup, login and profile maintenance.
///
/// Uniqueness of username and email is left to the storage constraints; a
/// clash surfaces as [`StoreError::DuplicateKey`] from the write that hit it.
#[derive(Clone)]
pub struct IdentityStore {
    hasher: CredentialHasher,
    defaults: ProfileDefaults,
    // Verified against when the username is unknown, so both failure paths
    // pay for one hash verification.
    decoy_hash: OnceLock<String>,
}

impl IdentityStore {
    pub fn new(hasher: CredentialHasher, defaults: ProfileDefaults) -> Self {
        Self {
            hasher,
            defaults,
            decoy_hash: OnceLock::new(),
        }
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    /// Hash the password and stage a new user in `tx`.
    ///
    /// Nothing is visible to other connections until the caller commits.
    pub fn signup(&self, tx: &Transaction<'_>, new_user: NewUser) -> StoreResult<User> {
        require_non_empty("username", &new_user.username)?;
        require_non_empty("email", &new_user.email)?;

        let password = self.hasher.hash(&new_user.password)?;

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            image_url: or_default(new_user.image_url, &self.defaults.image_url),
            header_image_url: self.defaults.header_image_url.clone(),
            bio: None,
            location: None,
            password,
        };

        tx.execute(
            "INSERT INTO users
                 (id, email, username, image_url, header_image_url, bio, location, password)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.username,
                user.image_url,
                user.header_image_url,
                user.bio,
                user.location,
                user.password,
            ],
        )?;

        info!(user_id = %user.id, username = %user.username, "User signed up");
        Ok(user)
    }

    /// Look up `username` and check `password` against its stored hash.
    ///
    /// An unknown username and a wrong password both yield
    /// [`StoreError::NotAuthenticated`].
    pub fn authenticate(
        &self,
        conn: &Connection,
        username: &str,
        password: &str,
    ) -> StoreResult<User> {
        let Some(user) = get_user_by_username(conn, username)? else {
            let _ = self.hasher.verify(self.decoy_hash(), password);
            warn!("Authentication rejected");
            return Err(StoreError::NotAuthenticated);
        };

        if !self.hasher.verify(&user.password, password) {
            warn!("Authentication rejected");
            return Err(StoreError::NotAuthenticated);
        }

        Ok(user)
    }

    /// Replace the password after re-checking the current one.
    pub fn change_password(
        &self,
        tx: &Transaction<'_>,
        user_id: Uuid,
        current: &str,
        new_password: &str,
    ) -> StoreResult<()> {
        let user = require_user(tx, user_id)?;

        if !self.hasher.verify(&user.password, current) {
            warn!(user_id = %user_id, "Password change rejected");
            return Err(StoreError::NotAuthenticated);
        }

        let hash = self.hasher.hash(new_password)?;
        tx.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2",
            params![hash, user_id],
        )?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub fn update_profile(
        &self,
        tx: &Transaction<'_>,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> StoreResult<User> {
        let mut user = require_user(tx, user_id)?;

        if let Some(username) = update.username {
            require_non_empty("username", &username)?;
            user.username = username;
        }
        if let Some(email) = update.email {
            require_non_empty("email", &email)?;
            user.email = email;
        }
        if let Some(url) = update.image_url {
            user.image_url = or_default(Some(url), &self.defaults.image_url);
        }
        if let Some(url) = update.header_image_url {
            user.header_image_url = or_default(Some(url), &self.defaults.header_image_url);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio).filter(|b| !b.is_empty());
        }
        if let Some(location) = update.location {
            user.location = Some(location).filter(|l| !l.is_empty());
        }

        tx.execute(
            "UPDATE users
             SET email = ?1, username = ?2, image_url = ?3, header_image_url = ?4,
                 bio = ?5, location = ?6
             WHERE id = ?7",
            params![
                user.email,
                user.username,
                user.image_url,
                user.header_image_url,
                user.bio,
                user.location,
                user.id,
            ],
        )?;

        Ok(user)
    }

    fn decoy_hash(&self) -> &str {
        self.decoy_hash.get_or_init(|| {
            self.hasher
                .hash(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| FALLBACK_DECOY_HASH.to_string())
        })
    }
}

pub fn get_user(conn: &Connection, id: Uuid) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
    Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
}

/// Remove a user. Storage cascades take their messages, follow edges on
/// both sides, their likes and the likes on their messages.
pub fn delete_user(tx: &Transaction<'_>, id: Uuid) -> StoreResult<bool> {
    let removed = tx.execute("DELETE FROM users WHERE id = ?1", [id])? > 0;
    if removed {
        info!(user_id = %id, "User deleted");
    }
    Ok(removed)
}

fn require_user(conn: &Connection, id: Uuid) -> StoreResult<User> {
    get_user(conn, id)?.ok_or(StoreError::NotFound { entity: "user", id })
}

fn require_non_empty(field: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fresh_db, identity, new_user, signup};
    use crate::{content, social};

    #[test]
    fn signup_stores_hash_not_plaintext() {
        let db = fresh_db();
        let store = identity();

        let user = db
            .transaction(|tx| {
                store.signup(
                    tx,
                    NewUser {
                        username: "test".into(),
                        email: "abc@abc.com".into(),
                        password: "test123".into(),
                        image_url: Some("/test.jpg".into()),
                    },
                )
            })
            .unwrap();

        assert_eq!(user.username, "test");
        assert_eq!(user.image_url, "/test.jpg");
        assert_ne!(user.password, "test123");
        assert!(store.hasher().verify(&user.password, "test123"));

        let stored = db
            .with_conn(|conn| get_user(conn, user.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored, user);
    }

    #[test]
    fn signup_applies_default_images() {
        let db = fresh_db();
        let store = IdentityStore::new(
            CredentialHasher::with_params(1024, 1, 1).unwrap(),
            ProfileDefaults {
                image_url: "/img/anon.png".into(),
                header_image_url: "/img/hero.jpg".into(),
            },
        );

        let mut input = new_user("plain");
        input.image_url = None;
        let user = db.transaction(|tx| store.signup(tx, input)).unwrap();
        assert_eq!(user.image_url, "/img/anon.png");
        assert_eq!(user.header_image_url, "/img/hero.jpg");

        let mut input = new_user("blank");
        input.image_url = Some(String::new());
        let user = db.transaction(|tx| store.signup(tx, input)).unwrap();
        assert_eq!(user.image_url, "/img/anon.png");
    }

    #[test]
    fn signup_rejects_empty_fields_without_writing() {
        let db = fresh_db();
        let store = identity();

        let mut input = new_user("nopass");
        input.password = String::new();
        let err = db.transaction(|tx| store.signup(tx, input)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let mut input = new_user("noemail");
        input.email = String::new();
        let err = db.transaction(|tx| store.signup(tx, input)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = db.transaction(|tx| store.signup(tx, new_user(""))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        assert_eq!(db.stats().unwrap().users, 0);
    }

    #[test]
    fn duplicate_username_and_email_are_rejected_by_storage() {
        let db = fresh_db();
        let store = identity();
        signup(&db, "taken");

        let mut same_name = new_user("taken");
        same_name.email = "other@test.com".into();
        let err = db.transaction(|tx| store.signup(tx, same_name)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        let mut same_email = new_user("fresh");
        same_email.email = "taken@test.com".into();
        let err = db.transaction(|tx| store.signup(tx, same_email)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        assert_eq!(db.stats().unwrap().users, 1);
    }

    #[test]
    fn authenticate_success() {
        let db = fresh_db();
        let store = identity();
        let user = signup(&db, "login");

        let found = db
            .with_conn(|conn| store.authenticate(conn, "login", "123456"))
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn authenticate_does_not_reveal_which_check_failed() {
        let db = fresh_db();
        let store = identity();
        signup(&db, "login");

        let wrong_password = db
            .with_conn(|conn| store.authenticate(conn, "login", "654321"))
            .unwrap_err();
        let unknown_user = db
            .with_conn(|conn| store.authenticate(conn, "nobody", "123456"))
            .unwrap_err();

        assert!(matches!(wrong_password, StoreError::NotAuthenticated));
        assert!(matches!(unknown_user, StoreError::NotAuthenticated));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn fallback_decoy_is_a_verifiable_hash() {
        // parses with the default Argon2id parameters, so verify does full work on it
        assert!(!CredentialHasher::new().needs_rehash(FALLBACK_DECOY_HASH));
        assert!(!identity().hasher().verify(FALLBACK_DECOY_HASH, "123456"));
    }

    #[test]
    fn unknown_user_path_uses_a_real_decoy_hash() {
        let db = fresh_db();
        let store = identity();

        let err = db
            .with_conn(|conn| store.authenticate(conn, "nobody", "123456"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAuthenticated));

        let decoy = store.decoy_hash.get().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(!store.hasher().needs_rehash(decoy));
    }

    #[test]
    fn authenticate_rejects_unhashed_password_column() {
        let db = fresh_db();
        let store = identity();
        db.transaction(|tx| {
            tx.execute(
                "INSERT INTO users (id, email, username, image_url, header_image_url, password)
                 VALUES (?1, 'test@test.com', 'testuser', '/a.png', '/b.jpg', 'HASHED_PASSWORD')",
                [Uuid::new_v4()],
            )?;
            Ok(())
        })
        .unwrap();

        let err = db
            .with_conn(|conn| store.authenticate(conn, "testuser", "HASHED_PASSWORD"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAuthenticated));
    }

    #[test]
    fn change_password_requires_current() {
        let db = fresh_db();
        let store = identity();
        let user = signup(&db, "changer");

        let err = db
            .transaction(|tx| store.change_password(tx, user.id, "wrong", "newpass"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAuthenticated));

        let err = db
            .transaction(|tx| store.change_password(tx, user.id, "123456", ""))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        db.transaction(|tx| store.change_password(tx, user.id, "123456", "newpass"))
            .unwrap();

        db.with_conn(|conn| {
            assert!(store.authenticate(conn, "changer", "newpass").is_ok());
            assert!(store.authenticate(conn, "changer", "123456").is_err());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn update_profile_fields() {
        let db = fresh_db();
        let store = identity();
        let user = signup(&db, "profile");

        let updated = db
            .transaction(|tx| {
                store.update_profile(
                    tx,
                    user.id,
                    ProfileUpdate {
                        bio: Some("Birdwatcher".into()),
                        location: Some("Lisbon".into()),
                        header_image_url: Some("/custom-hero.jpg".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Birdwatcher"));
        assert_eq!(updated.location.as_deref(), Some("Lisbon"));
        assert_eq!(updated.header_image_url, "/custom-hero.jpg");
        assert_eq!(updated.username, "profile");

        let cleared = db
            .transaction(|tx| {
                store.update_profile(
                    tx,
                    user.id,
                    ProfileUpdate {
                        image_url: Some(String::new()),
                        bio: Some(String::new()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(cleared.image_url, ProfileDefaults::default().image_url);
        assert_eq!(cleared.bio, None);
        assert_eq!(cleared.location.as_deref(), Some("Lisbon"));

        let stored = db
            .with_conn(|conn| get_user(conn, user.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored, cleared);
    }

    #[test]
    fn update_profile_errors() {
        let db = fresh_db();
        let store = identity();
        let user = signup(&db, "first");
        signup(&db, "second");

        let err = db
            .transaction(|tx| {
                store.update_profile(
                    tx,
                    user.id,
                    ProfileUpdate {
                        username: Some("second".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        let err = db
            .transaction(|tx| {
                store.update_profile(
                    tx,
                    user.id,
                    ProfileUpdate {
                        email: Some(String::new()),
                        ..Default::default()
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let missing = Uuid::new_v4();
        let err = db
            .transaction(|tx| store.update_profile(tx, missing, ProfileUpdate::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "user", id } if id == missing));
    }

    #[test]
    fn new_user_has_no_messages_or_followers() {
        let db = fresh_db();
        let user = signup(&db, "testuser");

        db.with_conn(|conn| {
            assert!(content::messages_by_user(conn, user.id)?.is_empty());
            assert!(social::followers(conn, user.id)?.is_empty());
            assert!(social::following(conn, user.id)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn delete_user_reports_whether_removed() {
        let db = fresh_db();
        let user = signup(&db, "gone");

        assert!(db.transaction(|tx| delete_user(tx, user.id)).unwrap());
        assert!(!db.transaction(|tx| delete_user(tx, user.id)).unwrap());
        assert!(db.with_conn(|conn| get_user(conn, user.id)).unwrap().is_none());
    }
}
