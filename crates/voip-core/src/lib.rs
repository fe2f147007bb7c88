//! VoIP Admin Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the CDR ingestion service. It includes:
//!
//! - Domain models (normalized CDR, resolved references, recordings)
//! - Store traits the ingestion engine runs its transaction against
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
