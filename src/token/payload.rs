use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Time source for issuance and expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of token identifiers (`jti`)
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Claims carried by every token.
///
/// Timestamps travel as unix seconds, so they are truncated to whole
/// seconds at issuance and survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "jti")]
    pub id: Uuid,
    #[serde(rename = "sub")]
    pub username: String,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expired_at: DateTime<Utc>,
}

impl Payload {
    /// Fails with [`TokenError::Encode`] when `now + duration` is not a
    /// representable timestamp.
    pub fn new(
        id: Uuid,
        username: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let issued_at = now.trunc_subsecs(0);
        let expired_at = issued_at
            .checked_add_signed(duration)
            .ok_or_else(|| TokenError::Encode("duration out of range".to_string()))?;
        Ok(Self {
            id,
            username: username.to_string(),
            issued_at,
            expired_at,
        })
    }

    /// Valid while `now <= expired_at`
    pub fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now > self.expired_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}
