//! Namespaced key/value persistence for question-bank study state.
//!
//! A [`KeyedObjectStore`] keeps one entry per [`Namespace`] (mastery levels,
//! notes, highlights, test lists, color theme, tree expansion). Most entries
//! are JSON objects addressed by question sub-keys such as `"0,2"`; `color`
//! is a bare string.
//!
//! # Backing modes
//!
//! - **Local-only** -- every namespace is JSON text in a [`LocalStorage`]
//!   ([`InMemoryStorage`] or [`FileStorage`]).
//! - **Remote-mirrored** -- synced namespaces live in an in-memory mirror
//!   owned by the store; each change is also sent to a [`RemoteSink`]
//!   (normally [`HttpSink`]) as `PUT`/`DELETE {base}/{user}/{ns}[/{key}]`.
//!
//! # Design Rules
//!
//! 1. Reading a namespace that was never written yields an empty mapping.
//! 2. Sub-key writes and deletes leave sibling sub-keys untouched.
//! 3. A mirrored write is visible to reads before its network call resolves.
//! 4. Remote failures are logged, never returned, never rolled back.
//! 5. Corrupted persisted JSON is an error, never silently reset.

pub mod config;
pub mod error;
pub mod file;
pub mod mapping;
pub mod memory;
pub mod namespace;
pub mod remote;
pub mod store;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{BackendConfig, StoreConfig};
pub use error::{RemoteError, RemoteResult, StoreError, StoreResult};
pub use file::FileStorage;
pub use mapping::Mapping;
pub use memory::InMemoryStorage;
pub use namespace::{Namespace, DEFAULT_APP_PREFIX};
pub use remote::{HttpSink, PendingWrite, RecordingSink, RemoteMethod, RemoteRequest, RemoteSink};
pub use store::{CurrentKeyFn, KeyedObjectStore, RemoteMirror};
pub use traits::LocalStorage;
