mod archers;
mod auth;
mod clubs;
mod error;
mod pagination;
mod settings;
mod slug;
mod sqlite;
mod users;
mod validate;

use std::sync::Arc;

use error::AppResult;
use settings::Settings;

use anyhow::Result;
use sqlx::SqlitePool;
use tokio::{net::TcpListener, time::Instant};

use axum::{routing::get, serve, Router};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
    settings: Arc<Settings>,
    /// Default author for records created without one.
    owner_id: String,
}

async fn create_app(settings: Settings) -> Result<Router> {
    let db = sqlite::create_pool(&settings.sqlite).await?;
    let owner_id = users::ensure_owner(&settings.owner, &db).await?;

    let app_state = AppState {
        db,
        settings: Arc::new(settings),
        owner_id,
    };

    let app = Router::new()
        .route("/hi", get(|| async { "Hello, World!" }))
        .route("/users", get(users::get_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user_by_id).delete(users::delete_user),
        )
        .route(
            "/archers",
            get(archers::get_archers).post(archers::create_archer),
        )
        .route("/archers/info", get(archers::get_archer_info))
        .route(
            "/archers/{id}",
            get(archers::get_archer_by_id)
                .put(archers::update_archer)
                .patch(archers::patch_archer)
                .delete(archers::delete_archer),
        )
        .route("/clubs", get(clubs::get_clubs).post(clubs::create_club))
        .route(
            "/clubs/{id}",
            get(clubs::get_club_by_id)
                .put(clubs::update_club)
                .patch(clubs::patch_club)
                .delete(clubs::delete_club),
        )
        .route("/memberships", get(clubs::memberships::get_memberships))
        .route(
            "/memberships/{id}",
            get(clubs::memberships::get_membership_by_id),
        )
        .with_state(app_state);

    Ok(app)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenv::dotenv().ok();
    dotenv::from_path("./api/.env").ok();

    let start = Instant::now();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::load()?;
    let port = settings.server.port;

    let app = create_app(settings).await?;

    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = async move {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => {},
            _ = terminate => {},
        }
        let duration = start.elapsed();
        info!("Shutting down gracefully... in {:?}", duration);
    };

    let server = serve(listener, app).with_graceful_shutdown(shutdown);

    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }

    Ok(())
}
