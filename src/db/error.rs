//! Ledger store error types

use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors surfaced by the ledger store and the transaction coordinator.
///
/// Storage failures are carried verbatim; the store never reclassifies
/// them. Callers use the `is_*` helpers to map them onto user-facing
/// categories.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The unit of work failed and so did the rollback that followed it.
    #[error("tx err: {tx}, rb err: {rollback}")]
    Rollback {
        tx: Box<StoreError>,
        rollback: Box<StoreError>,
    },
}

impl StoreError {
    /// The error that aborted the unit of work, looking through a failed
    /// rollback.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Rollback { tx, .. } => tx.root(),
            other => other,
        }
    }

    fn sqlx(&self) -> Option<&sqlx::Error> {
        match self.root() {
            StoreError::Database(e) => Some(e),
            StoreError::Rollback { .. } => None,
        }
    }

    fn sql_state(&self) -> Option<String> {
        match self.sqlx()? {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.sqlx(), Some(sqlx::Error::RowNotFound))
    }

    pub fn is_unique_violation(&self) -> bool {
        self.sql_state().as_deref() == Some(UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state().as_deref() == Some(FOREIGN_KEY_VIOLATION)
    }
}
