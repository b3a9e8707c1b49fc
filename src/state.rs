use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::AppConfig,
    extractors::hash_token,
    metadata::{MetadataSource, OmdbClient},
    models::user_model::NewUser,
    store::{CatalogStore, MemoryStore, MongoStore, StoreError},
};

pub type SharedStore = Arc<dyn CatalogStore>;
pub type SharedMetadata = Option<Arc<dyn MetadataSource>>;

/// Handles shared by every request, injected as an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub metadata: SharedMetadata,
}

impl AppState {
    pub fn new(store: SharedStore, metadata: SharedMetadata) -> Self {
        AppState { store, metadata }
    }

    /// Connects the configured store and metadata source, then seeds the bootstrap admin.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: SharedStore = match &config.mongodb_uri {
            Some(uri) => Arc::new(MongoStore::connect(uri, &config.mongodb_database).await?),
            None => {
                warn!("MONGODB_URI not set, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let metadata: SharedMetadata = match &config.omdb_api_key {
            Some(key) => Some(Arc::new(OmdbClient::new(&config.omdb_base_url, key)?)),
            None => {
                info!("OMDB_API_KEY not set, metadata enrichment disabled");
                None
            }
        };

        let state = AppState::new(store, metadata);
        if let Some(token) = &config.bootstrap_admin_token {
            state.ensure_admin(token).await?;
        }
        Ok(state)
    }

    async fn ensure_admin(&self, token: &str) -> anyhow::Result<()> {
        let token_hash = hash_token(token);
        if self.store.find_user_by_token_hash(&token_hash).await?.is_some() {
            return Ok(());
        }
        let admin = NewUser {
            username: "admin".to_string(),
            email: "admin@localhost".to_string(),
            token_hash,
            is_admin: true,
        };
        match self.store.insert_user(admin).await {
            Ok(user) => info!(user_id = %user.id, "bootstrap admin created"),
            Err(StoreError::Conflict(_)) => {
                warn!("an 'admin' user already exists with a different token, bootstrap token ignored")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
