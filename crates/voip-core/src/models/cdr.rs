//! CDR (Call Detail Record) model
//!
//! A [`NormalizedCdr`] is the validated, typed form of one switch CDR. It is
//! built fresh for each ingestion call and is never mutated once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated call detail record ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCdr {
    /// Call unique identifier (idempotency key)
    pub call_uuid: String,

    /// Call direction as reported by the switch
    pub direction: String,

    /// Caller number (ANI)
    pub caller_id_number: Option<String>,

    /// Dialed destination number
    pub destination_number: Option<String>,

    /// Call start timestamp
    pub start_time: DateTime<Utc>,

    /// Call answer timestamp (None if not answered)
    pub answer_time: Option<DateTime<Utc>>,

    /// Call end timestamp
    pub end_time: DateTime<Utc>,

    /// Total call duration in seconds
    pub duration: i32,

    /// Billable duration in seconds
    pub billsec: i32,

    /// Hangup cause code
    pub hangup_cause: Option<String>,

    /// Queue name the call was routed through
    pub queue_name: Option<String>,

    /// External identifier of the agent who handled the call
    pub agent_id: Option<String>,

    /// Recording file path on the switch
    pub recording_file: Option<String>,

    /// Original payload, kept for audit and replay
    pub raw: serde_json::Value,
}

impl NormalizedCdr {
    /// Check if the call was answered
    #[inline]
    pub fn was_answered(&self) -> bool {
        self.answer_time.is_some()
    }

    /// Check if this is an inbound call
    #[inline]
    pub fn is_inbound(&self) -> bool {
        self.direction.eq_ignore_ascii_case("inbound")
    }

    /// Check if this is an outbound call
    #[inline]
    pub fn is_outbound(&self) -> bool {
        self.direction.eq_ignore_ascii_case("outbound")
    }

    /// Whether the record carries a recording that must be referenced
    #[inline]
    pub fn has_recording(&self) -> bool {
        self.recording_file.is_some()
    }
}
