use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub url: String,
    pub max_connections: u32,
}

pub async fn create_pool(settings: &Settings) -> Result<SqlitePool> {
    match Sqlite::database_exists(&settings.url).await? {
        true => tracing::info!("Database already exists"),
        false => tracing::info!("Creating database at {}", settings.url),
    }

    // Referential protection relies on SQLite enforcing foreign keys.
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("db/migrations").run(&pool).await?;

    Ok(pool)
}
