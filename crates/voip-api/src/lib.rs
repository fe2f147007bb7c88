//! API layer for the VoIP admin CDR service
//!
//! HTTP handlers for FreeSWITCH CDR delivery and service health.

#![forbid(unsafe_code)]

pub mod handlers;

pub use handlers::{configure, health, ingest_cdr};
