use std::sync::Arc;

use crate::{
    authentication::jwt::SessionKeys,
    config::Config,
    constants::{DATABASE_MAX_CONNECTIONS, MAX_UPLOAD_BYTES},
    error::Error,
    media::MediaStore,
    memory::MemoryStore,
    postgres::PgStore,
    store::Store,
};

pub struct State {
    pub store: Arc<dyn Store>,
    pub keys: SessionKeys,
    pub media: MediaStore,
    pub max_upload_bytes: u64,
}

impl State {
    pub async fn new(config: &Config) -> Result<Arc<Self>, Error> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url, DATABASE_MAX_CONNECTIONS).await?),
            None => {
                log::warn!("No database configured, data will be lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };
        log::info!("Using {} store", store.backend_tag());

        let keys = SessionKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_hours)?;
        let media = MediaStore::new(config.media_root.to_owned());

        Ok(Arc::new(Self {
            store,
            keys,
            media,
            max_upload_bytes: config.max_upload_bytes,
        }))
    }

    pub fn with_store(store: Arc<dyn Store>, keys: SessionKeys, media: MediaStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            keys,
            media,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        })
    }
}
