use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use halaqat::api::router;
use halaqat::identity::{FirebaseIdentity, IdentityConfig, TokenSlot};
use halaqat::state::{AppConfig, AppState};
use halaqat::store::{FirestoreConfig, FirestoreStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "halaqat=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let token = TokenSlot::new();
    let identity = Arc::new(FirebaseIdentity::new(IdentityConfig::new_from_env()?, token.clone())?);
    let store = Arc::new(FirestoreStore::new(FirestoreConfig::new_from_env()?, token)?);

    let state = AppState::new(store, identity, pool, &config.admin_email);
    state.session.spawn_sign_out_listener();

    let dark_mode = state.session.dark_mode().await?;
    info!("dark mode {}", if dark_mode { "on" } else { "off" });

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    if !config.bind_addr.ip().is_loopback() {
        warn!("{} is not a loopback address; every client shares one session", config.bind_addr);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
