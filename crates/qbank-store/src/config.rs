use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::file::FileStorage;
use crate::memory::InMemoryStorage;
use crate::namespace::DEFAULT_APP_PREFIX;
use crate::remote::HttpSink;
use crate::store::{KeyedObjectStore, RemoteMirror};
use crate::traits::LocalStorage;

/// Configuration of a [`KeyedObjectStore`].
///
/// ```toml
/// app_prefix = "tutorme.qbank"
///
/// [backend]
/// mode = "remote"
/// base_url = "http://127.0.0.1:5000"
/// base_path = "/storage"
/// user = "step2"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub app_prefix: String,
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_prefix: DEFAULT_APP_PREFIX.into(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Everything in local storage; in memory when `path` is unset.
    Local { path: Option<PathBuf> },
    /// Synced namespaces mirrored to an HTTP storage endpoint.
    Remote {
        base_url: String,
        #[serde(default = "default_base_path")]
        base_path: String,
        user: String,
        /// Local storage for the local-only namespaces.
        path: Option<PathBuf>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Local { path: None }
    }
}

fn default_base_path() -> String {
    "/storage".into()
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Build the store this configuration describes.
    ///
    /// Remote backends must be built inside a tokio runtime.
    pub fn build(&self) -> StoreResult<KeyedObjectStore> {
        let store = match &self.backend {
            BackendConfig::Local { path } => KeyedObjectStore::local_only(open_local(path.as_deref())?),
            BackendConfig::Remote {
                base_url,
                base_path,
                user,
                path,
            } => {
                let sink = Arc::new(HttpSink::new(base_url.as_str()));
                let remote = RemoteMirror::new(base_path.as_str(), user.as_str(), sink)?;
                KeyedObjectStore::remote_mirrored(open_local(path.as_deref())?, remote)
            }
        };
        Ok(store.with_app_prefix(self.app_prefix.as_str()))
    }
}

fn open_local(path: Option<&Path>) -> StoreResult<Arc<dyn LocalStorage>> {
    let storage: Arc<dyn LocalStorage> = match path {
        Some(p) => Arc::new(FileStorage::open(p)?),
        None => Arc::new(InMemoryStorage::new()),
    };
    Ok(storage)
}
