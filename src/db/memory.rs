//! In-memory ledger for tests
//!
//! Mirrors the row-locking behaviour the transfer engine relies on: the
//! first balance update of an account takes that account's lock, which is
//! held until the transaction commits, rolls back or is dropped. Writes are
//! staged per transaction and only become visible on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use super::error::StoreError;
use super::ledger::{Ledger, LedgerTx};
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};

/// Failure to inject into the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Begin,
    Rollback,
    AddBalance { id: i64 },
}

/// Write performed inside a transaction, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateTransfer,
    CreateEntry { account_id: i64, amount: i64 },
    AddBalance { id: i64, amount: i64 },
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    next_account_id: i64,
    next_entry_id: i64,
    next_transfer_id: i64,
    committed_ops: Vec<Vec<Op>>,
    commits: usize,
    rollbacks: usize,
    faults: Vec<Fault>,
    update_delay: Duration,
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<State>>,
    row_locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

fn injected(msg: impl Into<String>) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(msg.into()))
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, owner: &str, currency: &str, balance: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_account_id += 1;
        let id = state.next_account_id;
        state.accounts.insert(
            id,
            Account {
                id,
                owner: owner.to_string(),
                currency: currency.to_string(),
                balance,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn balance(&self, id: i64) -> Option<i64> {
        self.state.lock().unwrap().accounts.get(&id).map(|a| a.balance)
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Operation log of every committed transaction, in commit order
    pub fn committed_ops(&self) -> Vec<Vec<Op>> {
        self.state.lock().unwrap().committed_ops.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    pub fn inject(&self, fault: Fault) {
        self.state.lock().unwrap().faults.push(fault);
    }

    /// Sleep between taking a row lock and applying the delta
    pub fn set_update_delay(&self, delay: Duration) {
        self.state.lock().unwrap().update_delay = delay;
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let mut state = self.state.lock().unwrap();
        let pos = state.faults.iter().position(|f| *f == fault);
        match pos {
            Some(pos) => {
                state.faults.remove(pos);
                true
            }
            None => false,
        }
    }

    fn row_lock(&self, id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.row_locks
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        if self.take_fault(Fault::Begin) {
            return Err(injected("begin refused"));
        }
        Ok(MemoryTx {
            ledger: self.clone(),
            held: HashMap::new(),
            ops: Vec::new(),
            deltas: BTreeMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
        })
    }
}

pub struct MemoryTx {
    ledger: MemoryLedger,
    held: HashMap<i64, OwnedMutexGuard<()>>,
    ops: Vec<Op>,
    deltas: BTreeMap<i64, i64>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let id = {
            let mut state = self.ledger.state.lock().unwrap();
            state.next_transfer_id += 1;
            state.next_transfer_id
        };
        let transfer = Transfer {
            id,
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.ops.push(Op::CreateTransfer);
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        let id = {
            let mut state = self.ledger.state.lock().unwrap();
            state.next_entry_id += 1;
            state.next_entry_id
        };
        let entry = Entry {
            id,
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.ops.push(Op::CreateEntry {
            account_id: arg.account_id,
            amount: arg.amount,
        });
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        if self.ledger.take_fault(Fault::AddBalance { id: arg.id }) {
            return Err(injected(format!("injected failure on account {}", arg.id)));
        }
        if self.ledger.balance(arg.id).is_none() {
            return Err(sqlx::Error::RowNotFound.into());
        }

        if !self.held.contains_key(&arg.id) {
            let guard = self.ledger.row_lock(arg.id).lock_owned().await;
            self.held.insert(arg.id, guard);
        }

        let delay = self.ledger.state.lock().unwrap().update_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut account = self
            .ledger
            .state
            .lock()
            .unwrap()
            .accounts
            .get(&arg.id)
            .cloned()
            .ok_or(sqlx::Error::RowNotFound)?;
        let staged = self.deltas.entry(arg.id).or_insert(0);
        let pending = staged
            .checked_add(arg.amount)
            .ok_or_else(|| injected("bigint out of range"))?;
        account.balance = account
            .balance
            .checked_add(pending)
            .ok_or_else(|| injected("bigint out of range"))?;
        *staged = pending;

        self.ops.push(Op::AddBalance {
            id: arg.id,
            amount: arg.amount,
        });
        Ok(account)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.ledger.state.lock().unwrap();
        for (id, delta) in &self.deltas {
            if let Some(account) = state.accounts.get_mut(id) {
                account.balance += delta;
            }
        }
        state.transfers.extend(self.transfers.iter().cloned());
        state.entries.extend(self.entries.iter().cloned());
        state.committed_ops.push(self.ops.clone());
        state.commits += 1;
        // Row locks are released when `self.held` drops, after the writes
        // above are visible.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        if self.ledger.take_fault(Fault::Rollback) {
            return Err(injected("rollback refused"));
        }
        self.ledger.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}
