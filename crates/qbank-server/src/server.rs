use std::sync::Arc;

use qbank_store::{FileStorage, InMemoryStorage, LocalStorage};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::settings::SettingsStore;

/// Storage server for mirrored study state.
pub struct QbankServer {
    config: ServerConfig,
}

impl QbankServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured settings storage.
    pub fn settings(&self) -> ServerResult<SettingsStore> {
        let storage: Arc<dyn LocalStorage> = match &self.config.data_path {
            Some(path) => Arc::new(FileStorage::open(path)?),
            None => Arc::new(InMemoryStorage::new()),
        };
        Ok(SettingsStore::new(storage, self.config.app_prefix.as_str()))
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(Arc::new(self.settings()?)))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("qbank storage server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
