//! Integration tests for the CDR ingest and health handlers
//!
//! Handlers run against the in-memory store; see `voip-db` for the
//! PostgreSQL-backed tests.

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use voip_ingest::memory::{FailPoint, MemoryStore};
use voip_ingest::{CdrIngestor, CdrParser};

fn engine(store: &MemoryStore) -> web::Data<CdrIngestor<MemoryStore>> {
    web::Data::new(
        CdrIngestor::new(store.clone()).with_parser(CdrParser::with_zone(chrono_tz::UTC)),
    )
}

fn cdr_body(call_uuid: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "variables": {
            "uuid": call_uuid,
            "direction": "inbound",
            "caller_id_number": "1001",
            "destination_number": "2002",
            "start_stamp": "2024-01-01 10:00:00",
            "answer_stamp": "2024-01-01 10:00:05",
            "end_stamp": "2024-01-01 10:01:00",
            "duration": "60",
            "billsec": "55",
            "hangup_cause": "NORMAL_CLEARING",
            "queue_name": "support"
        }
    }))
    .unwrap()
}

macro_rules! app {
    ($store:expr) => {
        test::init_service(
            App::new()
                .app_data(engine(&$store))
                .app_data(web::PayloadConfig::new(64 * 1024))
                .configure(voip_api::configure::<MemoryStore>),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_ingest_returns_ok() {
    let store = MemoryStore::new();
    let queue = store.add_queue("support");
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .insert_header(("content-type", "application/json"))
        .set_payload(cdr_body("http-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"OK");

    let stored = store.cdr("http-1").unwrap();
    assert_eq!(stored.refs.queue_id, Some(queue));
}

#[actix_rt::test]
async fn test_redelivery_returns_conflict() {
    let store = MemoryStore::new();
    let app = app!(store);

    for expected in [StatusCode::OK, StatusCode::CONFLICT, StatusCode::CONFLICT] {
        let req = test::TestRequest::post()
            .uri("/fs/cdr")
            .set_payload(cdr_body("http-2"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
    }

    assert_eq!(store.cdr_count(), 1);
}

#[actix_rt::test]
async fn test_conflict_body() {
    let store = MemoryStore::new();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload(cdr_body("http-3"))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload(cdr_body("http-3"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["error"], "duplicate_cdr");
    assert_eq!(body["status"], 409);
}

#[actix_rt::test]
async fn test_invalid_payload_returns_bad_request() {
    let store = MemoryStore::new();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut payload: Value = serde_json::from_slice(&cdr_body("http-4")).unwrap();
    payload["variables"]["end_stamp"] = json!("yesterday");
    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_cdr_data");
    assert_eq!(body["field"], "end_stamp");

    assert_eq!(store.stats().begun, 0);
}

#[actix_rt::test]
async fn test_storage_failure_returns_server_error() {
    let store = MemoryStore::new();
    store.fail_on(FailPoint::Commit);
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload(cdr_body("http-5"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "cdr_storage_failure");
    assert!(body.get("field").is_none());

    // The switch retries once the database is back
    store.clear_failures();
    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload(cdr_body("http-5"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_oversized_payload_rejected() {
    let store = MemoryStore::new();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/fs/cdr")
        .set_payload(vec![b' '; 128 * 1024])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.stats().begun, 0);
}

#[actix_rt::test]
async fn test_health_ok() {
    let store = MemoryStore::new();
    let app = app!(store);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
}

#[actix_rt::test]
async fn test_health_reports_unreachable_database() {
    let store = MemoryStore::new();
    store.fail_on(FailPoint::Ping);
    let app = app!(store);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_rt::test]
async fn test_ingest_rejects_get() {
    let store = MemoryStore::new();
    let app = app!(store);

    let req = test::TestRequest::get().uri("/fs/cdr").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}
