//! Health check endpoint

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;
use voip_core::traits::CdrStore;
use voip_ingest::CdrIngestor;

const SERVICE_NAME: &str = "voipadmind";

/// Report service health, including database reachability
///
/// GET /health
pub async fn health<S: CdrStore + 'static>(ingestor: web::Data<CdrIngestor<S>>) -> HttpResponse {
    match ingestor.store().ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "database": "ok",
        })),
        Err(e) => {
            warn!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "database": "unreachable",
            }))
        }
    }
}
