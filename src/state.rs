use std::sync::Arc;

use crate::config::Config;
use crate::handoff::CredentialHandoff;
use crate::store::{MemoryStore, PgStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub handoff: CredentialHandoff,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            handoff: CredentialHandoff::new(),
        })
    }

    /// Connect the configured store: PostgreSQL when a URL is set, memory otherwise.
    pub async fn connect(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                log::info!("Connecting to PostgreSQL");
                Arc::new(PgStore::connect(url, config.max_connections).await?)
            }
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(store, config))
    }
}
