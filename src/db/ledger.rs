//! Transaction boundary for the ledger store
//!
//! [`Ledger`] opens units of work; [`LedgerTx`] is the scoped handle the
//! transfer engine writes through. The Postgres implementation wraps a
//! `sqlx::Transaction`, which issues `ROLLBACK` on drop, so a unit of work
//! abandoned mid-flight (cancelled task, timeout) never commits and never
//! keeps its row locks.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};
use super::queries;

/// Write primitives available inside a unit of work
#[async_trait]
pub trait LedgerTx: Send {
    async fn create_transfer(&mut self, arg: CreateTransferParams)
    -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Atomic `balance = balance + amount`, returning the post-update row
    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Source of transactional handles
#[async_trait]
pub trait Ledger: Send + Sync {
    type Tx: LedgerTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL-backed ledger
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

/// Open PostgreSQL transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        queries::create_transfer(&mut *self.tx, arg).await
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        queries::create_entry(&mut *self.tx, arg).await
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        queries::add_account_balance(&mut *self.tx, arg).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
