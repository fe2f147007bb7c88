//! VoIP Admin CDR ingestion server
//!
//! Receives FreeSWITCH JSON CDRs over HTTP and stores each call exactly once,
//! however many times the switch delivers it.

use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voip_core::config::LoggingConfig;
use voip_core::AppConfig;
use voip_db::{create_pool, run_migrations, PgCdrStore};
use voip_ingest::CdrIngestor;

#[derive(Parser, Debug)]
#[command(name = "voipadmind")]
#[command(author, version, about = "FreeSWITCH CDR ingestion service")]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE", env = "VOIPADMIND_CONFIG")]
    config: Option<PathBuf>,

    /// Validate config and exit
    #[arg(long)]
    validate: bool,
}

/// Initialize tracing/logging
fn init_tracing(logging: &LoggingConfig) {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "voipadmind={0},voip_api={0},voip_ingest={0},voip_db={0},voip_core={0},actix_web=info,sqlx=warn",
            log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config_path = args
        .config
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());

    let config =
        AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    init_tracing(&config.logging);

    info!("Starting voipadmind v{}", env!("CARGO_PKG_VERSION"));

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("failed to create database pool")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("failed to apply database migrations")?;
    } else {
        warn!("Automatic migrations disabled; expecting an up to date schema");
    }

    let ingestor = web::Data::new(
        CdrIngestor::from_config(PgCdrStore::new(pool.clone()), &config.ingest)
            .context("invalid ingest configuration")?,
    );

    info!(
        timeout_secs = config.ingest.timeout_secs,
        timezone = config.ingest.timezone.as_deref().unwrap_or("local"),
        max_payload_bytes = config.ingest.max_payload_bytes,
        "CDR ingestion configured"
    );

    let bind_addr = config.server_addr();
    let max_payload = config.ingest.max_payload_bytes;

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(ingestor.clone())
            .app_data(web::PayloadConfig::new(max_payload))
            .wrap(middleware::NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(voip_api::configure::<PgCdrStore>)
    })
    .workers(config.server.workers)
    .shutdown_timeout(config.server.shutdown_timeout_secs)
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await?;

    info!("HTTP server stopped, closing database pool");
    pool.close().await;

    Ok(())
}
