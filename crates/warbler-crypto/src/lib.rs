//! Warbler credential hashing.
//!
//! Passwords are stored as Argon2id PHC strings. The string carries the
//! algorithm, parameters and salt, so verification needs nothing else.

pub mod password;

pub use password::{CredentialHasher, CryptoError};
