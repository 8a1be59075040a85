use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use convoy_api::{app, AppState, AuthConfig};
use convoy_core::{TripStore, UserDirectory};
use convoy_store::app_config::{Config, StorageBackend};
use convoy_store::{
    DbClient, InMemoryTripStore, InMemoryUserDirectory, PostgresTripStore, PostgresUserDirectory, RedisClient,
};
use convoy_trips::{PagingPolicy, RetryPolicy, TripService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convoy_api=debug,convoy_trips=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Convoy API on port {}", config.server.port);

    // Storage
    let (store, users): (Arc<dyn TripStore>, Arc<dyn UserDirectory>) = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, trips are lost on restart");
            let store: Arc<dyn TripStore> = Arc::new(InMemoryTripStore::new());
            let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
            (store, users)
        }
        StorageBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .context("storage.backend = \"postgres\" requires a [database] section")?;
            let db = DbClient::new(db_config).await.context("Failed to connect to Postgres")?;
            if config.storage.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            let store: Arc<dyn TripStore> = Arc::new(PostgresTripStore::new(db.pool.clone()));
            let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(db.pool));
            (store, users)
        }
    };

    let rules = &config.booking;
    let trips = TripService::new(
        store,
        users,
        RetryPolicy::attempts(rules.max_admit_attempts),
        PagingPolicy {
            default_page_size: rules.default_page_size,
            max_page_size: rules.max_page_size,
        },
    );

    let mut app_state = AppState::new(
        Arc::new(trips),
        AuthConfig { secret: config.auth.jwt_secret.clone() },
    )?;

    // Redis Connection (rate limiting)
    match &config.redis {
        Some(redis) => {
            let client = RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?;
            app_state = app_state.with_rate_limit(Arc::new(client), config.rate_limit.clone());
        }
        None => tracing::info!("No Redis configured, rate limiting disabled"),
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
