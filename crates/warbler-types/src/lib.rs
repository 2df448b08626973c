pub mod models;

pub use models::{
    Follow, Like, Message, NewUser, ProfileDefaults, ProfileUpdate, User, MAX_MESSAGE_LEN,
};
