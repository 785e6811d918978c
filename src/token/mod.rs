//! Bearer token issuance and verification
//!
//! Two interchangeable [`Maker`] implementations share one contract:
//!
//! | maker            | integrity | confidential payload | key            |
//! |------------------|-----------|----------------------|----------------|
//! | [`JwtMaker`]     | HMAC-SHA256 | no                 | >= 32 bytes    |
//! | [`EncryptedMaker`] | AES-256-GCM tag | yes          | exactly 32 bytes |
//!
//! Verification authenticates first and only then looks at the expiry, so
//! a forged token is always [`TokenError::InvalidToken`] and a genuine but
//! stale one is always [`TokenError::ExpiredToken`].

mod encrypted;
mod jwt;
mod payload;

pub use encrypted::EncryptedMaker;
pub use jwt::JwtMaker;
pub use payload::{Clock, IdSource, Payload, RandomIds, SystemClock};

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use crate::config::{TokenConfig, TokenKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key size: must be at least {min} bytes")]
    KeyTooSmall { min: usize },

    #[error("invalid key size: must be exactly {expected} bytes")]
    KeyWrongSize { expected: usize },

    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("failed to issue token: {0}")]
    Encode(String),
}

/// Issues and verifies bearer tokens bound to a secret key
pub trait Maker: Send + Sync {
    /// Creates a token for `username` valid for `duration` from now
    fn create_token(&self, username: &str, duration: Duration)
    -> Result<(String, Payload), TokenError>;

    /// Authenticates `token` and checks that it has not expired
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}

/// Builds the maker selected in the configuration
pub fn maker_from_config(config: &TokenConfig) -> Result<Arc<dyn Maker>, TokenError> {
    let maker: Arc<dyn Maker> = match config.kind {
        TokenKind::Jwt => Arc::new(JwtMaker::new(&config.symmetric_key)?),
        TokenKind::Encrypted => Arc::new(EncryptedMaker::new(&config.symmetric_key)?),
    };
    Ok(maker)
}
