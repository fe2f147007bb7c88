//! CDR ingestion engine
//!
//! Turns a raw FreeSWITCH JSON CDR into exactly one `voip.cdr` row, no matter
//! how many times the switch delivers it.
//!
//! # Flow
//!
//! ```text
//! raw bytes
//!     |
//!     v
//! CdrParser (validate + normalize, no I/O)
//!     |
//!     v
//! IngestSession (one transaction)
//!     |-- resolve queue      (best effort)
//!     |-- resolve agent      (best effort)
//!     |-- upsert recording   (fatal on error)
//!     |-- insert-or-ignore CDR row
//!     v
//! commit on Inserted, rollback otherwise
//! ```
//!
//! Every failure is reported as an [`IngestError`] whose [`IngestErrorKind`]
//! tells the transport how to answer the switch.

pub mod error;
pub mod ingestor;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod parser;
pub mod resolver;
pub mod session;
pub mod writer;

pub use error::{IngestError, IngestErrorKind, ValidationError};
pub use ingestor::{CdrIngestor, IngestReceipt};
pub use parser::{CdrParser, FreeSwitchCdr};
pub use session::{IngestSession, IngestStage};
pub use writer::WriteOutcome;

/// Ingestion constants
pub mod constants {
    use std::time::Duration;

    /// Layout of FreeSWITCH `*_stamp` variables
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Default bound for one ingestion transaction
    pub const DEFAULT_INGEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Bound for the rollback issued after a failed or timed out ingestion
    pub const ROLLBACK_TIMEOUT: Duration = Duration::from_secs(5);
}
