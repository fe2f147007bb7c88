//! Repository implementations
//!
//! Concrete implementations of the store traits defined in voip-core,
//! using sqlx for PostgreSQL access.

pub mod cdr_store;

pub use cdr_store::{PgCdrStore, PgCdrTransaction};
