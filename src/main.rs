use sms_auth::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemoryRepository, PostgresRepository, RepositoryState, seed_admin},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the credential store, seeds
/// the bootstrap admin and serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // Panics in Production when the signing secret or database URL is missing.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins when set; otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sms_auth=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Credential Store Initialization
    // Postgres when DATABASE_URL is configured; Local may run without one.
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory credential store");
            Arc::new(MemoryRepository::new())
        }
    };

    // 5. Unified State Assembly
    // Builds the token codec and password hasher around the store.
    let bind_addr = config.bind_addr.clone();
    let seed = config.seed_admin.clone();
    let app_state = AppState::new(repo, config).expect("FATAL: invalid Argon2 cost parameters");

    // 6. Bootstrap Admin
    // Idempotent: an existing admin with the same username is left untouched.
    if let Some(seed) = seed {
        seed_admin(
            app_state.repo.as_ref(),
            &app_state.hasher,
            &seed.username,
            &seed.password,
        )
        .await
        .expect("FATAL: failed to seed the bootstrap admin account");
    }

    // 7. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind the HTTP listener");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    // The long-running Axum server process.
    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated");
}
