use std::sync::Arc;
use std::time::Duration;

use crate::config::TokenConfig;
use crate::db::{Database, PgLedger, Store};
use crate::token::Maker;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: Arc<Store<PgLedger>>,
    pub token_maker: Arc<dyn Maker>,
    pub token_config: TokenConfig,
    /// Upper bound for one transfer, lock waits included
    pub transfer_timeout: Duration,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        token_maker: Arc<dyn Maker>,
        token_config: TokenConfig,
        transfer_timeout: Duration,
    ) -> Self {
        let store = Arc::new(Store::new(PgLedger::new(db.pool().clone())));
        Self {
            db,
            store,
            token_maker,
            token_config,
            transfer_timeout,
        }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.db.pool()
    }
}
