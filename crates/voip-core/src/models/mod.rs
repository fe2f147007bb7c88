//! Domain models for the CDR ingestion service
//!
//! This module contains the core domain models shared by the ingestion
//! engine, the store implementations and the HTTP layer.

pub mod cdr;
pub mod reference;

pub use cdr::NormalizedCdr;
pub use reference::{RecordingBackend, Resolution, ResolvedRefs};
