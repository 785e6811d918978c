//! simple_bank - banking back end
//!
//! Accounts, users and atomic money transfers over PostgreSQL, with bearer
//! token authentication.
//!
//! # Modules
//!
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - connection pool, ledger store, transaction coordinator and transfer engine
//! - [`token`] - bearer token makers (signed JWT, encrypted)
//! - [`password`] - argon2 password hashing
//! - [`gateway`] - REST API (axum)

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod password;
pub mod token;

pub use db::{Store, StoreError, TransferTxParams, TransferTxResult};
pub use token::{Maker, Payload, TokenError};
