use warbler_crypto::CredentialHasher;
use warbler_types::{NewUser, ProfileDefaults, User};

use crate::{Database, IdentityStore};

pub fn fresh_db() -> Database {
    Database::open_in_memory().unwrap()
}

/// Identity store with cheap Argon2 parameters.
pub fn identity() -> IdentityStore {
    IdentityStore::new(
        CredentialHasher::with_params(1024, 1, 1).unwrap(),
        ProfileDefaults::default(),
    )
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password: "123456".to_string(),
        image_url: Some("/test.jpg".to_string()),
    }
}

pub fn signup(db: &Database, username: &str) -> User {
    let store = identity();
    db.transaction(|tx| store.signup(tx, new_user(username))).unwrap()
}
