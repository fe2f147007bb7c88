//! Benchmarks for CDR parsing
//!
//! Run with: cargo bench --package voip-ingest
//!
//! These benchmarks measure decoding and validation only (no database).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use voip_ingest::CdrParser;

/// Create a FreeSWITCH CDR payload with `padding` extra channel variables
fn create_payload(call_uuid: &str, padding: usize) -> Vec<u8> {
    let mut vars = json!({
        "uuid": call_uuid,
        "direction": "inbound",
        "caller_id_number": "51999888777",
        "destination_number": "15551234567",
        "start_stamp": "2024-01-01 10:00:00",
        "answer_stamp": "2024-01-01 10:00:05",
        "end_stamp": "2024-01-01 10:01:00",
        "duration": "60",
        "billsec": "55",
        "hangup_cause": "NORMAL_CLEARING",
        "queue_name": "support",
        "agent_id": "agent-7",
        "recording_file": "/var/lib/freeswitch/recordings/call.wav"
    });

    if let Some(map) = vars.as_object_mut() {
        for i in 0..padding {
            map.insert(format!("sip_h_X-Custom-{}", i), json!("value"));
        }
    }

    serde_json::to_vec(&json!({ "variables": vars })).unwrap()
}

/// Benchmark a typical CDR in the local and a named zone
fn bench_parse(c: &mut Criterion) {
    let raw = create_payload("bench-call", 0);

    let local = CdrParser::new();
    c.bench_function("parse_cdr_local_zone", |b| {
        b.iter(|| local.parse(black_box(&raw)).unwrap());
    });

    let named = CdrParser::with_zone(chrono_tz::America::Bogota);
    c.bench_function("parse_cdr_named_zone", |b| {
        b.iter(|| named.parse(black_box(&raw)).unwrap());
    });
}

/// Benchmark rejection of an invalid CDR
fn bench_reject(c: &mut Criterion) {
    let parser = CdrParser::new();
    let raw = serde_json::to_vec(&json!({
        "variables": { "uuid": "bench-call", "start_stamp": "yesterday" }
    }))
    .unwrap();

    c.bench_function("reject_invalid_start", |b| {
        b.iter(|| parser.parse(black_box(&raw)).unwrap_err());
    });
}

/// Benchmark payload size scaling; real CDRs carry hundreds of variables
fn bench_payload_size(c: &mut Criterion) {
    let parser = CdrParser::with_zone(chrono_tz::UTC);
    let mut group = c.benchmark_group("parse_by_variable_count");

    for padding in [0usize, 100, 500].iter() {
        let raw = create_payload("bench-call", *padding);

        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(padding), &raw, |b, raw| {
            b.iter(|| parser.parse(black_box(raw)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_reject, bench_payload_size);
criterion_main!(benches);
