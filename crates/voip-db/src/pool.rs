//! PostgreSQL connection pool management
//!
//! Provides utilities for creating the connection pool, checking it and
//! applying the embedded migrations.

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};
use voip_core::config::DatabaseConfig;
use voip_core::{AppError, AppResult};

/// Idle timeout for pooled connections in seconds
const DEFAULT_IDLE_TIMEOUT: u64 = 600;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Create a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database section of the application configuration
///
/// # Returns
///
/// A configured `PgPool` that answered a health check
///
/// # Example
///
/// ```no_run
/// use voip_core::config::DatabaseConfig;
/// use voip_db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::with_url("postgresql://localhost/voip");
///     let pool = create_pool(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<PgPool> {
    info!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .max_lifetime(Some(Duration::from_secs(config.max_lifetime_secs)))
        .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT)))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| {
            warn!("Failed to create database pool: {}", e);
            AppError::Pool(format!("Failed to connect to database: {}", e))
        })?;

    info!(
        "Database pool created successfully with {} max connections",
        config.max_connections
    );

    ping(&pool).await?;

    info!("Database connection verified");

    Ok(pool)
}

/// Run a trivial query to check the pool can serve requests
pub async fn ping(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Database health check failed: {}", e)))?;

    Ok(())
}

/// Apply pending schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!("Applying database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!("Migration failed: {}", e);
        AppError::Migration(e.to_string())
    })?;

    info!("Database schema is up to date");

    Ok(())
}
