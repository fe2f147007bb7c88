//! FreeSWITCH CDR delivery endpoint
//!
//! `mod_json_cdr` posts one JSON document per call and retries on anything
//! but a 2xx. A 409 tells it the call is already stored; a 500 invites a
//! retry, which the idempotent write makes safe.

use actix_web::{web, HttpResponse};
use tracing::{debug, instrument};
use voip_core::traits::CdrStore;
use voip_ingest::{CdrIngestor, IngestError};

/// Ingest one CDR
///
/// POST /fs/cdr
#[instrument(skip(ingestor, body), fields(bytes = body.len()))]
pub async fn ingest_cdr<S: CdrStore + 'static>(
    ingestor: web::Data<CdrIngestor<S>>,
    body: web::Bytes,
) -> Result<HttpResponse, IngestError> {
    let receipt = ingestor.ingest(&body).await?;

    debug!(call_uuid = %receipt.call_uuid, refs = ?receipt.refs, "CDR accepted");

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("OK"))
}
