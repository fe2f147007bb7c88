//! Idempotent CDR row write

use tracing::{error, instrument};
use voip_core::models::{NormalizedCdr, ResolvedRefs};
use voip_core::traits::CdrTransaction;
use voip_core::{AppError, AppResult};

/// Result of the insert-or-ignore write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was inserted
    Inserted,
    /// A row with the same call uuid already existed; nothing changed
    AlreadyExists,
}

impl WriteOutcome {
    /// Classify the affected row count of an insert-or-ignore statement
    pub fn from_rows_affected(rows: u64) -> Option<Self> {
        match rows {
            1 => Some(WriteOutcome::Inserted),
            0 => Some(WriteOutcome::AlreadyExists),
            _ => None,
        }
    }
}

/// Insert the CDR row unless its call uuid is already stored
#[instrument(skip(tx, cdr, refs), fields(call_uuid = %cdr.call_uuid))]
pub async fn write_cdr<T: CdrTransaction>(
    tx: &mut T,
    cdr: &NormalizedCdr,
    refs: &ResolvedRefs,
) -> AppResult<WriteOutcome> {
    let rows = tx.insert_cdr(cdr, refs).await?;

    WriteOutcome::from_rows_affected(rows).ok_or_else(|| {
        error!("Insert of CDR {} affected {} rows", cdr.call_uuid, rows);
        AppError::Database(format!(
            "Insert of CDR {} affected {} rows",
            cdr.call_uuid, rows
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_rows() {
        assert_eq!(WriteOutcome::from_rows_affected(1), Some(WriteOutcome::Inserted));
        assert_eq!(
            WriteOutcome::from_rows_affected(0),
            Some(WriteOutcome::AlreadyExists)
        );
        assert_eq!(WriteOutcome::from_rows_affected(2), None);
    }
}
