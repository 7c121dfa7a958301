//! # configs
//!
//! Layered runtime settings. Sources, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. `config/community.toml` (optional),
//! 3. `COMMUNITY__*` environment variables, after loading `.env` if present.
//!
//! Nested keys use a double underscore: `COMMUNITY__STORAGE__BACKEND=sqlite`,
//! `COMMUNITY__PAGINATION__MAX_LIMIT=50`.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use domains::Page;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "config/community";
pub const ENV_PREFIX: &str = "COMMUNITY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Only read for `sqlite`. May carry credentials for other drivers, so it
    /// stays wrapped.
    pub database_url: SecretString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaginationSettings {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl PaginationSettings {
    /// Resolves caller-supplied paging input against the configured bounds.
    pub fn page(&self, limit: Option<u32>, offset: Option<u32>) -> Page {
        Page::bounded(limit, offset, self.default_limit, self.max_limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    pub users: u32,
    pub rounds: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub pagination: PaginationSettings,
    pub log: LogSettings,
    pub simulation: SimulationSettings,
}

impl Settings {
    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
                .add_source(
                    Environment::with_prefix(ENV_PREFIX)
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    /// Applies defaults under the given sources, then deserializes and
    /// validates.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder
            .set_default("storage.backend", "memory")?
            .set_default("storage.database_url", "sqlite://community.db")?
            .set_default("pagination.default_limit", i64::from(Page::DEFAULT_LIMIT))?
            .set_default("pagination.max_limit", i64::from(Page::MAX_LIMIT))?
            .set_default("log.level", "info")?
            .set_default("log.format", "compact")?
            .set_default("simulation.users", 8)?
            .set_default("simulation.rounds", 5)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(
            backend = ?settings.storage.backend,
            default_limit = settings.pagination.default_limit,
            max_limit = settings.pagination.max_limit,
            "settings loaded"
        );
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let PaginationSettings {
            default_limit,
            max_limit,
        } = self.pagination;
        if max_limit == 0 {
            return Err(SettingsError::invalid("pagination.max_limit", "must be at least 1"));
        }
        if default_limit == 0 || default_limit > max_limit {
            return Err(SettingsError::invalid(
                "pagination.default_limit",
                format!("must be between 1 and max_limit ({max_limit}), got {default_limit}"),
            ));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.database_url.expose_secret().trim().is_empty() {
            return Err(SettingsError::invalid("storage.database_url", "required for the sqlite backend"));
        }
        if self.simulation.users < 2 {
            return Err(SettingsError::invalid(
                "simulation.users",
                "at least two users are needed to exchange messages",
            ));
        }
        if self.simulation.rounds == 0 {
            return Err(SettingsError::invalid("simulation.rounds", "must be at least 1"));
        }
        Ok(())
    }
}
