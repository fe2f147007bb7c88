//! HTTP request handlers

pub mod cdr_ingest;
pub mod health;

use actix_web::web;
use voip_core::traits::CdrStore;

pub use cdr_ingest::ingest_cdr;
pub use health::health;

/// Register the ingest and health routes
///
/// Expects a `web::Data<CdrIngestor<S>>` in the application data.
pub fn configure<S: CdrStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/fs/cdr", web::post().to(ingest_cdr::<S>))
        .route("/health", web::get().to(health::<S>));
}
