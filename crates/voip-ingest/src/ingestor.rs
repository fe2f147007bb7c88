//! CDR ingestion orchestrator
//!
//! Validates a raw payload, then stores it through one [`IngestSession`]
//! bounded by a deadline. Exactly one CDR row exists per call uuid no matter
//! how often the payload is delivered:
//!
//! - a fresh call uuid is committed and returns an [`IngestReceipt`]
//! - a stored call uuid rolls back and returns [`IngestError::Duplicate`]
//! - any storage error or timeout rolls back and returns
//!   [`IngestError::StorageFailure`]

use crate::constants::{DEFAULT_INGEST_TIMEOUT, ROLLBACK_TIMEOUT};
use crate::error::IngestError;
use crate::parser::CdrParser;
use crate::session::IngestSession;
use crate::writer::WriteOutcome;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{error, info, instrument, warn};
use voip_core::config::IngestConfig;
use voip_core::models::{NormalizedCdr, ResolvedRefs};
use voip_core::traits::{CdrStore, CdrTransaction};
use voip_core::{AppError, AppResult};

/// Acknowledgement of a newly stored CDR
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub call_uuid: String,
    #[serde(flatten)]
    pub refs: ResolvedRefs,
}

/// Ingestion engine over a transactional store
pub struct CdrIngestor<S: CdrStore> {
    store: S,
    parser: CdrParser,
    timeout: Duration,
}

impl<S: CdrStore> CdrIngestor<S> {
    /// Create an ingestor reading timestamps in the process local zone
    pub fn new(store: S) -> Self {
        Self {
            store,
            parser: CdrParser::new(),
            timeout: DEFAULT_INGEST_TIMEOUT,
        }
    }

    /// Create an ingestor from the `ingest` configuration section
    pub fn from_config(store: S, config: &IngestConfig) -> AppResult<Self> {
        let parser = match config.time_zone()? {
            Some(zone) => CdrParser::with_zone(zone),
            None => CdrParser::new(),
        };

        Ok(Self::new(store)
            .with_parser(parser)
            .with_timeout(config.timeout()))
    }

    pub fn with_parser(mut self, parser: CdrParser) -> Self {
        self.parser = parser;
        self
    }

    /// Bound every ingestion transaction by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate and store one raw FreeSWITCH CDR
    ///
    /// Validation happens before any transaction is opened, so an
    /// `InvalidData` error never touches the database.
    #[instrument(skip(self, raw), fields(bytes = raw.len()))]
    pub async fn ingest(&self, raw: &[u8]) -> Result<IngestReceipt, IngestError> {
        let cdr = self.parser.parse(raw)?;
        self.store_cdr(&cdr).await
    }

    /// Store an already validated CDR
    #[instrument(skip(self, cdr), fields(call_uuid = %cdr.call_uuid))]
    pub async fn store_cdr(&self, cdr: &NormalizedCdr) -> Result<IngestReceipt, IngestError> {
        let deadline = Instant::now() + self.timeout;

        let mut session = timeout_at(deadline, IngestSession::open(&self.store, cdr))
            .await
            .map_err(|_| self.timed_out(cdr, "begin"))??;

        let outcome = match timeout_at(deadline, session.run()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(call_uuid = %cdr.call_uuid, stage = ?session.stage(), "CDR ingestion failed: {}", e);
                Self::abort(session).await;
                return Err(IngestError::StorageFailure(e));
            }
            Err(_) => {
                let stage = session.stage();
                Self::abort(session).await;
                return Err(self.timed_out(cdr, &format!("{:?}", stage)).into());
            }
        };

        match outcome {
            WriteOutcome::AlreadyExists => {
                info!(call_uuid = %cdr.call_uuid, "CDR already exists");
                Self::abort(session).await;
                Err(IngestError::Duplicate {
                    call_uuid: cdr.call_uuid.clone(),
                })
            }
            WriteOutcome::Inserted => {
                let refs = match timeout_at(deadline, session.commit()).await {
                    Ok(result) => result?,
                    Err(_) => return Err(self.timed_out(cdr, "commit").into()),
                };

                info!(
                    call_uuid = %cdr.call_uuid,
                    direction = %cdr.direction,
                    "Inserted CDR"
                );

                Ok(IngestReceipt {
                    call_uuid: cdr.call_uuid.clone(),
                    refs,
                })
            }
        }
    }

    /// Roll back a session without letting the rollback outlive its own bound
    async fn abort<T: CdrTransaction>(session: IngestSession<'_, T>) {
        let call_uuid = session.cdr().call_uuid.clone();

        if timeout(ROLLBACK_TIMEOUT, session.rollback()).await.is_err() {
            error!(call_uuid = %call_uuid, "Rollback of CDR transaction timed out");
        }
    }

    fn timed_out(&self, cdr: &NormalizedCdr, step: &str) -> AppError {
        error!(
            call_uuid = %cdr.call_uuid,
            step,
            timeout_ms = self.timeout.as_millis() as u64,
            "CDR ingestion timed out"
        );
        AppError::Timeout(format!(
            "CDR {} ingestion timed out after {:?} at {}",
            cdr.call_uuid, self.timeout, step
        ))
    }
}
