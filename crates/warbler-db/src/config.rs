use std::path::PathBuf;

use warbler_types::ProfileDefaults;

pub const DEFAULT_DATABASE_URL: &str = "warbler.db";

/// Where the relational store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts a bare path, `sqlite://path`, `sqlite:path` or `:memory:`.
    pub fn parse(url: &str) -> Self {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if path == ":memory:" {
            DatabaseLocation::Memory
        } else {
            DatabaseLocation::File(PathBuf::from(path))
        }
    }
}

/// Runtime settings for the data layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseLocation,
    pub profile_defaults: ProfileDefaults,
}

impl Config {
    /// Read settings from the process environment.
    ///
    /// `DATABASE_URL` selects the instance (production vs test);
    /// `WARBLER_DEFAULT_IMAGE_URL` and `WARBLER_DEFAULT_HEADER_IMAGE_URL`
    /// override the profile image fallbacks.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());

        let fallback = ProfileDefaults::default();
        let profile_defaults = ProfileDefaults {
            image_url: get("WARBLER_DEFAULT_IMAGE_URL").unwrap_or(fallback.image_url),
            header_image_url: get("WARBLER_DEFAULT_HEADER_IMAGE_URL")
                .unwrap_or(fallback.header_image_url),
        };

        Self {
            database: DatabaseLocation::parse(&database_url),
            profile_defaults,
        }
    }
}
