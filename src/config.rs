use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the ledger store
    pub postgres_url: String,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
    pub token: TokenConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for one transfer unit of work, lock waits included
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}

/// Which token maker the gateway issues bearer tokens with
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// HMAC-signed JWT (payload readable by the holder)
    Jwt,
    /// AES-256-GCM sealed token (payload confidential)
    Encrypted,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    pub kind: TokenKind,
    pub symmetric_key: String,
    pub access_token_duration_secs: u64,
    pub refresh_token_duration_secs: u64,
}

impl TokenConfig {
    /// Saturates at `TimeDelta::MAX`; `AppConfig::load` rejects such values
    pub fn access_token_duration(&self) -> chrono::Duration {
        secs_to_delta(self.access_token_duration_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn refresh_token_duration(&self) -> chrono::Duration {
        secs_to_delta(self.refresh_token_duration_secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Token lifetimes must be positive and leave a representable expiry
    pub fn validate(&self) -> anyhow::Result<()> {
        let now = chrono::Utc::now();
        for (name, secs) in [
            ("access_token_duration_secs", self.access_token_duration_secs),
            ("refresh_token_duration_secs", self.refresh_token_duration_secs),
        ] {
            let delta = secs_to_delta(secs)
                .filter(|d| *d > chrono::Duration::zero())
                .with_context(|| format!("token.{name} out of range: {secs}"))?;
            now.checked_add_signed(delta)
                .with_context(|| format!("token.{name} out of range: {secs}"))?;
        }
        Ok(())
    }
}

fn secs_to_delta(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
}

fn default_max_connections() -> u32 {
    20
}

fn default_transfer_timeout_ms() -> u64 {
    5_000
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse {}", config_path))?;
        config.token.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
