//! VoIP Admin Database Layer
//!
//! This crate provides PostgreSQL access for the CDR ingestion service:
//!
//! - Connection pool management with sqlx
//! - Embedded schema migrations
//! - The transactional [`PgCdrStore`] the ingestion engine runs against

pub mod pool;
pub mod repositories;

pub use pool::{create_pool, ping, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use sqlx::{PgPool, Postgres, Transaction};
pub use voip_core::{AppError, AppResult};
