use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{auth::Capability, sqlite};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub sqlite: sqlite::Settings,
    pub owner: OwnerSettings,
    pub pagination: PaginationSettings,
    pub access: AccessPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
}

/// The system account that owns every record created without an explicit author.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSettings {
    pub username: String,
    pub email: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    pub page_size: u32,
    pub max_page_size: u32,
}

/// Capability each group of routes demands from the caller.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AccessPolicy {
    pub archer_read: Capability,
    pub archer_write: Capability,
    pub clubs: Capability,
    pub users: Capability,
}

impl Settings {
    /// Defaults, then `config/default`, then `config/local`, then `ARCHERY__*` env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("server.port", 3000)?
            .set_default("sqlite.url", "sqlite://db/archery.db")?
            .set_default("sqlite.max_connections", 5)?
            .set_default("owner.username", "admin")?
            .set_default("owner.token", "")?
            .set_default("pagination.page_size", 2)?
            .set_default("pagination.max_page_size", 6)?
            .set_default("access.archer_read", "public")?
            .set_default("access.archer_write", "admin")?
            .set_default("access.clubs", "authenticated")?
            .set_default("access.users", "admin")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("ARCHERY").separator("__"))
            .build()?
            .try_deserialize()
    }
}
