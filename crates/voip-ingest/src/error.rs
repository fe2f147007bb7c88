//! Ingestion error taxonomy
//!
//! Callers classify a failed ingestion with [`IngestError::kind`]; no string
//! inspection is ever needed.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use voip_core::AppError;

/// Why a raw CDR was rejected before any database work
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("malformed cdr payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing uuid")]
    EmptyCallUuid,

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("invalid {field}: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
}

impl ValidationError {
    /// Name of the offending CDR variable, if the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::Malformed(_) => None,
            ValidationError::EmptyCallUuid => Some("uuid"),
            ValidationError::MissingField(field)
            | ValidationError::InvalidTimestamp { field, .. }
            | ValidationError::InvalidInteger { field, .. } => Some(field),
        }
    }
}

/// Coarse classification of an ingestion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestErrorKind {
    /// Caller error; redelivering the same payload cannot succeed
    InvalidData,
    /// The call uuid is already stored; nothing was written
    Duplicate,
    /// Database failure; redelivering the identical payload is safe
    StorageFailure,
}

/// Error returned by [`crate::CdrIngestor::ingest`]
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid cdr data: {0}")]
    InvalidData(#[from] ValidationError),

    #[error("cdr {call_uuid} already exists")]
    Duplicate { call_uuid: String },

    #[error("cdr storage failure: {0}")]
    StorageFailure(#[from] AppError),
}

impl IngestError {
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::InvalidData(_) => IngestErrorKind::InvalidData,
            IngestError::Duplicate { .. } => IngestErrorKind::Duplicate,
            IngestError::StorageFailure(_) => IngestErrorKind::StorageFailure,
        }
    }

    /// Whether redelivering the same payload may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == IngestErrorKind::StorageFailure
    }

    /// Offending field for validation failures
    pub fn field(&self) -> Option<&'static str> {
        match self {
            IngestError::InvalidData(e) => e.field(),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            IngestErrorKind::InvalidData => StatusCode::BAD_REQUEST,
            IngestErrorKind::Duplicate => StatusCode::CONFLICT,
            IngestErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            IngestErrorKind::InvalidData => "invalid_cdr_data",
            IngestErrorKind::Duplicate => "duplicate_cdr",
            IngestErrorKind::StorageFailure => "cdr_storage_failure",
        }
    }
}

impl ResponseError for IngestError {
    fn status_code(&self) -> StatusCode {
        IngestError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        if let Some(field) = self.field() {
            body["field"] = json!(field);
        }

        HttpResponse::build(status).json(body)
    }
}
