//! HTTP storage endpoint for question-bank study state.
//!
//! Serves the resources a remote-mirrored
//! [`KeyedObjectStore`](qbank_store::KeyedObjectStore) writes to:
//!
//! - `GET /storage/{user}` -- snapshot of all synced namespaces
//! - `PUT|POST|DELETE /storage/{user}/{namespace}` -- whole document
//! - `PUT|POST|DELETE /storage/{user}/{namespace}/{index}` -- one entry

pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod settings;

pub use config::ServerConfig;
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ServerError, ServerResult};
pub use server::QbankServer;
pub use settings::SettingsStore;
