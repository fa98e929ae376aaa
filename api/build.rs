use std::{path::Path, str::FromStr};

use anyhow::Result;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

static MIGRATOR: Migrator = sqlx::migrate!("./db/migrations");

#[tokio::main]
async fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=db/migrations");

    let current_dir = std::env::current_dir()?;

    setup_db(&current_dir).await?;

    Ok(())
}

/// Migrate a scratch database so `sqlx::query!` can check statements against
/// the schema at compile time.
async fn setup_db(current_dir: &Path) -> Result<()> {
    let db_path = current_dir.join("db/archery-build.db");
    let db_url = format!("sqlite://{}", db_path.display());

    println!("cargo:warning=Ensuring database exists at {}", &db_url);

    let connect_options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await?;

    MIGRATOR.run(&pool).await?;
    pool.close().await;

    // DATABASE_URL is what the sqlx macros connect to
    println!("cargo:rustc-env=DATABASE_URL={}", db_url);

    Ok(())
}
