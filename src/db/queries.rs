//! Ledger store primitives
//!
//! Single-statement queries usable against the pool or inside a transaction
//! (`&mut *tx`). Every write returns the affected row via `RETURNING`.

use sqlx::PgExecutor;
use uuid::Uuid;

use super::error::StoreError;
use super::models::*;

const ACCOUNT_COLUMNS: &str = "id, owner, currency, balance, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str =
    "username, full_name, email, hashed_password, password_changed_at, created_at";
const SESSION_COLUMNS: &str = "id, username, access_token, access_expires_at, refresh_token, \
     refresh_expires_at, user_agent, client_ip, is_blocked, created_at";

// ============================================================================
// Accounts
// ============================================================================

pub async fn create_account<'e>(
    db: impl PgExecutor<'e>,
    arg: &CreateAccountParams,
) -> Result<Account, StoreError> {
    let sql = format!(
        "INSERT INTO accounts (owner, currency, balance) VALUES ($1, $2, $3) RETURNING {ACCOUNT_COLUMNS}"
    );
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(&arg.owner)
        .bind(&arg.currency)
        .bind(arg.balance)
        .fetch_one(db)
        .await?;
    Ok(account)
}

pub async fn get_account<'e>(db: impl PgExecutor<'e>, id: i64) -> Result<Account, StoreError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1");
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(account)
}

/// Reads an account and takes its row lock until the transaction ends.
///
/// `FOR NO KEY UPDATE` keeps concurrent inserts of entries/transfers that
/// reference this row (foreign key share locks) from blocking.
pub async fn get_account_for_update<'e>(
    db: impl PgExecutor<'e>,
    id: i64,
) -> Result<Account, StoreError> {
    let sql =
        format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1 FOR NO KEY UPDATE");
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(account)
}

pub async fn list_accounts<'e>(
    db: impl PgExecutor<'e>,
    owner: &str,
    page: ListParams,
) -> Result<Vec<Account>, StoreError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3"
    );
    let accounts = sqlx::query_as::<_, Account>(&sql)
        .bind(owner)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(db)
        .await?;
    Ok(accounts)
}

/// Atomically adds a signed delta to the balance and returns the new row.
///
/// The single `UPDATE ... SET balance = balance + $1` takes the row lock and
/// applies the delta in one statement, so concurrent callers never lose an
/// update.
pub async fn add_account_balance<'e>(
    db: impl PgExecutor<'e>,
    arg: AddAccountBalanceParams,
) -> Result<Account, StoreError> {
    let sql = format!(
        "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
    );
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(arg.amount)
        .bind(arg.id)
        .fetch_one(db)
        .await?;
    Ok(account)
}

pub async fn delete_account<'e>(db: impl PgExecutor<'e>, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound.into());
    }
    Ok(())
}

// ============================================================================
// Entries
// ============================================================================

pub async fn create_entry<'e>(
    db: impl PgExecutor<'e>,
    arg: CreateEntryParams,
) -> Result<Entry, StoreError> {
    let sql =
        format!("INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}");
    let entry = sqlx::query_as::<_, Entry>(&sql)
        .bind(arg.account_id)
        .bind(arg.amount)
        .fetch_one(db)
        .await?;
    Ok(entry)
}

pub async fn get_entry<'e>(db: impl PgExecutor<'e>, id: i64) -> Result<Entry, StoreError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 LIMIT 1");
    let entry = sqlx::query_as::<_, Entry>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(entry)
}

pub async fn list_entries<'e>(
    db: impl PgExecutor<'e>,
    account_id: i64,
    page: ListParams,
) -> Result<Vec<Entry>, StoreError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3"
    );
    let entries = sqlx::query_as::<_, Entry>(&sql)
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(db)
        .await?;
    Ok(entries)
}

// ============================================================================
// Transfers
// ============================================================================

pub async fn create_transfer<'e>(
    db: impl PgExecutor<'e>,
    arg: CreateTransferParams,
) -> Result<Transfer, StoreError> {
    let sql = format!(
        "INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3) \
         RETURNING {TRANSFER_COLUMNS}"
    );
    let transfer = sqlx::query_as::<_, Transfer>(&sql)
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.amount)
        .fetch_one(db)
        .await?;
    Ok(transfer)
}

pub async fn get_transfer<'e>(db: impl PgExecutor<'e>, id: i64) -> Result<Transfer, StoreError> {
    let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1 LIMIT 1");
    let transfer = sqlx::query_as::<_, Transfer>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(transfer)
}

/// Transfers leaving or entering `account_id`, oldest first
pub async fn list_transfers<'e>(
    db: impl PgExecutor<'e>,
    account_id: i64,
    page: ListParams,
) -> Result<Vec<Transfer>, StoreError> {
    let sql = format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers \
         WHERE from_account_id = $1 OR to_account_id = $1 \
         ORDER BY id LIMIT $2 OFFSET $3"
    );
    let transfers = sqlx::query_as::<_, Transfer>(&sql)
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(db)
        .await?;
    Ok(transfers)
}

// ============================================================================
// Users & sessions
// ============================================================================

pub async fn create_user<'e>(
    db: impl PgExecutor<'e>,
    arg: &CreateUserParams,
) -> Result<User, StoreError> {
    let sql = format!(
        "INSERT INTO users (username, full_name, email, hashed_password) VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&arg.username)
        .bind(&arg.full_name)
        .bind(&arg.email)
        .bind(&arg.hashed_password)
        .fetch_one(db)
        .await?;
    Ok(user)
}

pub async fn get_user<'e>(db: impl PgExecutor<'e>, username: &str) -> Result<User, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 LIMIT 1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_one(db)
        .await?;
    Ok(user)
}

pub async fn create_session<'e>(
    db: impl PgExecutor<'e>,
    arg: &CreateSessionParams,
) -> Result<Session, StoreError> {
    let sql = format!(
        "INSERT INTO sessions (id, username, access_token, access_expires_at, refresh_token, \
         refresh_expires_at, user_agent, client_ip) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {SESSION_COLUMNS}"
    );
    let session = sqlx::query_as::<_, Session>(&sql)
        .bind(arg.id)
        .bind(&arg.username)
        .bind(&arg.access_token)
        .bind(arg.access_expires_at)
        .bind(&arg.refresh_token)
        .bind(arg.refresh_expires_at)
        .bind(&arg.user_agent)
        .bind(&arg.client_ip)
        .fetch_one(db)
        .await?;
    Ok(session)
}

pub async fn get_session<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Session, StoreError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 LIMIT 1");
    let session = sqlx::query_as::<_, Session>(&sql)
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(session)
}

pub async fn update_session_access<'e>(
    db: impl PgExecutor<'e>,
    arg: &UpdateSessionAccessParams,
) -> Result<Session, StoreError> {
    let sql = format!(
        "UPDATE sessions SET access_token = $2, access_expires_at = $3 WHERE id = $1 \
         RETURNING {SESSION_COLUMNS}"
    );
    let session = sqlx::query_as::<_, Session>(&sql)
        .bind(arg.id)
        .bind(&arg.access_token)
        .bind(arg.access_expires_at)
        .fetch_one(db)
        .await?;
    Ok(session)
}
