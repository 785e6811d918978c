//! Transaction coordinator and transfer engine
//!
//! ```text
//! transfer_tx(from, to, amount)
//!   └─ exec_tx ── BEGIN
//!        ├─ INSERT transfers (from, to, amount)
//!        ├─ INSERT entries (from, -amount)
//!        ├─ INSERT entries (to, +amount)
//!        ├─ UPDATE accounts  lower id first
//!        └─ UPDATE accounts  higher id second
//!      COMMIT  | ROLLBACK on any error
//! ```
//!
//! Two transfers touching the same pair of accounts always lock the rows in
//! ascending id order, whatever their direction, so they can wait on each
//! other but never deadlock.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::StoreError;
use super::ledger::{Ledger, LedgerTx};
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};

/// Input of one money transfer. `amount` is validated positive upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything a committed transfer produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Ledger store with transactional operations
pub struct Store<L> {
    ledger: L,
}

impl<L: Ledger> Store<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Runs `f` inside one database transaction.
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is rolled
    /// back and the original error returned; if the rollback fails too, both
    /// errors come back as [`StoreError::Rollback`]. Nothing is retried.
    pub async fn exec_tx<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut L::Tx) -> BoxFuture<'t, Result<T, StoreError>> + Send,
    {
        let mut tx = self.ledger.begin().await?;

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "Unit of work failed, rolling back");
                match tx.rollback().await {
                    Ok(()) => Err(err),
                    Err(rb_err) => {
                        error!(error = %err, rollback_error = %rb_err, "Rollback failed");
                        Err(StoreError::Rollback {
                            tx: Box::new(err),
                            rollback: Box::new(rb_err),
                        })
                    }
                }
            }
        }
    }

    /// Moves `amount` from one account to another as a single unit of work.
    ///
    /// Creates the transfer record, a debit entry for the source, a credit
    /// entry for the destination, then applies both balance deltas with the
    /// lower account id updated first. Currency and ownership are not
    /// checked here. Storage errors are returned unmodified.
    ///
    /// A self-transfer (`from == to`) records the transfer and both
    /// offsetting entries but applies a single zero delta, so the balance is
    /// unchanged and both returned accounts are the same row.
    pub async fn transfer_tx(&self, arg: TransferTxParams) -> Result<TransferTxResult, StoreError> {
        let result = self
            .exec_tx(move |tx| {
                Box::pin(async move {
                    let transfer = tx
                        .create_transfer(CreateTransferParams {
                            from_account_id: arg.from_account_id,
                            to_account_id: arg.to_account_id,
                            amount: arg.amount,
                        })
                        .await?;
                    debug!(transfer_id = transfer.id, "Transfer record created");

                    let from_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: arg.from_account_id,
                            amount: -arg.amount,
                        })
                        .await?;
                    let to_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: arg.to_account_id,
                            amount: arg.amount,
                        })
                        .await?;
                    debug!(
                        from_entry_id = from_entry.id,
                        to_entry_id = to_entry.id,
                        "Entries created"
                    );

                    let (from_account, to_account) = if arg.from_account_id == arg.to_account_id
                    {
                        let account = tx
                            .add_account_balance(AddAccountBalanceParams {
                                id: arg.from_account_id,
                                amount: 0,
                            })
                            .await?;
                        (account.clone(), account)
                    } else if arg.from_account_id < arg.to_account_id {
                        add_money(
                            tx,
                            arg.from_account_id,
                            -arg.amount,
                            arg.to_account_id,
                            arg.amount,
                        )
                        .await?
                    } else {
                        let (to_account, from_account) = add_money(
                            tx,
                            arg.to_account_id,
                            arg.amount,
                            arg.from_account_id,
                            -arg.amount,
                        )
                        .await?;
                        (from_account, to_account)
                    };
                    debug!(
                        from_balance = from_account.balance,
                        to_balance = to_account.balance,
                        "Balances updated"
                    );

                    Ok::<_, StoreError>(TransferTxResult {
                        transfer,
                        from_account,
                        to_account,
                        from_entry,
                        to_entry,
                    })
                })
            })
            .await?;

        info!(
            transfer_id = result.transfer.id,
            from_account_id = arg.from_account_id,
            to_account_id = arg.to_account_id,
            amount = arg.amount,
            "Transfer committed"
        );
        Ok(result)
    }
}

/// Applies two balance deltas strictly in argument order.
async fn add_money<T: LedgerTx>(
    tx: &mut T,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account), StoreError> {
    let account1 = tx
        .add_account_balance(AddAccountBalanceParams {
            id: account_id1,
            amount: amount1,
        })
        .await?;
    let account2 = tx
        .add_account_balance(AddAccountBalanceParams {
            id: account_id2,
            amount: amount2,
        })
        .await?;
    Ok((account1, account2))
}
