//! FreeSWITCH JSON CDR parsing
//!
//! Decodes the `{"variables": {...}}` envelope produced by `mod_json_cdr`
//! and normalizes it into a [`NormalizedCdr`]. Parsing is pure: no database
//! access happens here, so a payload rejected by the parser never opens a
//! transaction.

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::ValidationError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;
use voip_core::models::NormalizedCdr;

/// Top-level FreeSWITCH CDR document
#[derive(Debug, Default, Deserialize)]
pub struct FreeSwitchCdr {
    #[serde(default)]
    pub variables: CdrVariables,
}

/// Channel variables the service reads
///
/// FreeSWITCH reports every variable as a string. Absent and `null` values
/// both read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CdrVariables {
    pub uuid: Option<String>,
    pub direction: Option<String>,
    pub caller_id_number: Option<String>,
    pub destination_number: Option<String>,
    pub start_stamp: Option<String>,
    pub answer_stamp: Option<String>,
    pub end_stamp: Option<String>,
    pub duration: Option<String>,
    pub billsec: Option<String>,
    pub hangup_cause: Option<String>,
    pub queue_name: Option<String>,
    pub agent_id: Option<String>,
    pub recording_file: Option<String>,
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Trimmed value, `None` when blank
fn optional_text(value: &Option<String>) -> Option<String> {
    let trimmed = text(value).trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parser turning raw payloads into normalized CDRs
///
/// Switch timestamps carry no offset; they are read in the configured zone,
/// or in the process local zone when none is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdrParser {
    zone: Option<Tz>,
}

impl CdrParser {
    /// Parser reading timestamps in the process local zone
    pub fn new() -> Self {
        Self { zone: None }
    }

    /// Parser reading timestamps in a fixed IANA zone
    pub fn with_zone(zone: Tz) -> Self {
        Self { zone: Some(zone) }
    }

    pub fn zone(&self) -> Option<Tz> {
        self.zone
    }

    /// Parse and validate a raw CDR payload
    pub fn parse(&self, raw: &[u8]) -> Result<NormalizedCdr, ValidationError> {
        match self.zone {
            Some(zone) => parse_in(raw, &zone),
            None => parse_in(raw, &Local),
        }
    }
}

/// Parse and validate a raw CDR payload, reading timestamps in `zone`
///
/// Checks run in a fixed order: uuid, start, end, answer, duration, billsec.
/// The first failing check determines the error.
pub fn parse_in<Z: TimeZone>(raw: &[u8], zone: &Z) -> Result<NormalizedCdr, ValidationError> {
    let document: serde_json::Value = serde_json::from_slice(raw).map_err(|e| {
        warn!("Failed to decode FreeSWITCH CDR: {}", e);
        ValidationError::Malformed(e)
    })?;

    // PostgreSQL rejects NUL in TEXT and JSONB, so such a payload can never be stored
    if contains_nul(&document) {
        warn!("Rejecting CDR containing a NUL character");
        return Err(ValidationError::Malformed(
            <serde_json::Error as serde::de::Error>::custom("payload contains a NUL character"),
        ));
    }

    let envelope = FreeSwitchCdr::deserialize(&document).map_err(|e| {
        warn!("Unexpected FreeSWITCH CDR layout: {}", e);
        ValidationError::Malformed(e)
    })?;
    let vars = envelope.variables;

    let call_uuid = text(&vars.uuid);
    if call_uuid.trim().is_empty() {
        warn!("Rejecting CDR without uuid");
        return Err(ValidationError::EmptyCallUuid);
    }

    let start_time = required_timestamp(text(&vars.start_stamp), "start_stamp", zone)?;
    let end_time = required_timestamp(text(&vars.end_stamp), "end_stamp", zone)?;
    let answer_time = parse_timestamp(text(&vars.answer_stamp), "answer_stamp", zone)?;
    let duration = parse_seconds(text(&vars.duration), "duration")?;
    let billsec = parse_seconds(text(&vars.billsec), "billsec")?;

    Ok(NormalizedCdr {
        call_uuid: call_uuid.to_string(),
        direction: text(&vars.direction).to_string(),
        caller_id_number: optional_text(&vars.caller_id_number),
        destination_number: optional_text(&vars.destination_number),
        start_time,
        answer_time,
        end_time,
        duration,
        billsec,
        hangup_cause: optional_text(&vars.hangup_cause),
        queue_name: optional_text(&vars.queue_name),
        agent_id: optional_text(&vars.agent_id),
        recording_file: optional_text(&vars.recording_file),
        raw: document,
    })
}

fn contains_nul(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s.contains('\0'),
        serde_json::Value::Array(items) => items.iter().any(contains_nul),
        serde_json::Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value)),
        _ => false,
    }
}

fn required_timestamp<Z: TimeZone>(
    value: &str,
    field: &'static str,
    zone: &Z,
) -> Result<DateTime<Utc>, ValidationError> {
    parse_timestamp(value, field, zone)?.ok_or_else(|| {
        warn!("Rejecting CDR without {}", field);
        ValidationError::MissingField(field)
    })
}

/// Parse a switch timestamp; blank input yields `None`
///
/// A wall-clock time skipped by a DST transition is invalid. A repeated
/// wall-clock time resolves to its earliest instant.
fn parse_timestamp<Z: TimeZone>(
    value: &str,
    field: &'static str,
    zone: &Z,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let invalid = || {
        warn!("Invalid {} in CDR: {:?}", field, trimmed);
        ValidationError::InvalidTimestamp {
            field,
            value: trimmed.to_string(),
        }
    };

    let naive = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).map_err(|_| invalid())?;

    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| Some(local.with_timezone(&Utc)))
        .ok_or_else(invalid)
}

/// Parse a seconds counter; blank input yields 0
fn parse_seconds(value: &str, field: &'static str) -> Result<i32, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    trimmed.parse::<i32>().map_err(|_| {
        warn!("Invalid {} in CDR: {:?}", field, trimmed);
        ValidationError::InvalidInteger {
            field,
            value: trimmed.to_string(),
        }
    })
}
