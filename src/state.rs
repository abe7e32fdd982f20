// src/state.rs
use std::sync::Arc;

use tracing::info;

use crate::{
    config::Config,
    db::{create_pool, PgStore},
    store::{AccountStore, MemoryStore, PollStore, StoreError},
};

#[derive(Clone)]
pub struct AppState {
    pub polls: Arc<dyn PollStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        polls: Arc<dyn PollStore>,
        accounts: Arc<dyn AccountStore>,
        config: Config,
    ) -> Self {
        Self {
            polls,
            accounts,
            config: Arc::new(config),
        }
    }

    /// Connects to Postgres when `DATABASE_URL` is configured, else keeps everything in memory.
    pub async fn from_config(config: Config) -> Result<Self, StoreError> {
        match &config.database_url {
            Some(url) => {
                info!("Connecting to Postgres...");
                let pool = create_pool(url, config.database_max_connections).await?;
                let store = Arc::new(PgStore::new(pool));
                store.migrate().await?;
                Ok(Self::new(store.clone(), store, config))
            }
            None => {
                let store = Arc::new(MemoryStore::new());
                Ok(Self::new(store.clone(), store, config))
            }
        }
    }
}
