// src/main.rs

use coursevault::config::{Config, StorageBackend};
use coursevault::db::{UserStore, postgres::PgStore, vault::{VaultClient, postgres::PgVaultDriver}};
use coursevault::error::AppError;
use coursevault::models::user::{ROLE_ADMIN, User};
use coursevault::routes;
use coursevault::state::AppState;
use coursevault::utils::hash::hash_password;
use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let (state, worker) = match config.storage {
        StorageBackend::Postgres => {
            let pool = connect_with_retry(&config.database_url).await;

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");

            let driver = PgVaultDriver::new(
                &config.vault_database_url,
                Duration::from_secs(config.vault_statement_timeout_secs),
            );
            let vault = VaultClient::new(
                Arc::new(driver),
                &config.vault_keyspace,
                Duration::from_millis(config.vault_settle_ms),
            )
            .expect("VAULT_KEYSPACE is not a valid keyspace name");

            AppState::new(Arc::new(PgStore::new(pool)), Arc::new(vault), config.clone())
        }
        StorageBackend::Memory => {
            tracing::warn!("Running with in-memory storage; nothing survives a restart");
            AppState::in_memory(config.clone()).expect("Failed to build in-memory state")
        }
    };

    // Seed Admin User
    if let Err(e) = seed_admin_user(&*state.users, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    tokio::spawn(worker.run());

    // Bootstrap the vault in the background; requests that need it wait on the same attempt
    let vault = state.vault.clone();
    tokio::spawn(async move {
        match vault.ready().await {
            Ok(_) => tracing::info!("File vault '{}' ready", vault.keyspace()),
            Err(e) => tracing::warn!("File vault not ready yet: {}", e),
        }
    });

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Initialize Database Pool with Retry
async fn connect_with_retry(url: &str) -> PgPool {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");
    pool
}

async fn seed_admin_user(users: &dyn UserStore, config: &Config) -> Result<(), AppError> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if users.find_by_username(username).await?.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            let hashed_password = hash_password(password)?;

            users
                .insert_user(User {
                    id: Uuid::new_v4(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: format!("{}@localhost", username),
                    username: username.clone(),
                    password: hashed_password,
                    role: ROLE_ADMIN.to_string(),
                    enrolled_courses: Vec::new(),
                    created_courses: Vec::new(),
                    created_at: None,
                })
                .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
