//! The keyed object store facade.
//!
//! Every namespace holds one entry. Mapping-valued namespaces are read and
//! rewritten as a whole; the sub-key operations are read-modify-write on top
//! of that. Where the mapping lives depends on the backing mode:
//!
//! - local-only: JSON text in [`LocalStorage`] under `"{prefix}.{namespace}"`;
//! - remote-mirrored: an in-memory mirror owned by the store, with every
//!   change forwarded to a [`RemoteSink`] as a best-effort background call.
//!
//! `color` and `expanded` stay in local storage in both modes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::mapping::{kind_of, parse_mapping, to_text, to_value, Mapping};
use crate::namespace::{
    hilites_key, is_path_segment, notes_key, resource_path, snapshot_path, Namespace, DEFAULT_APP_PREFIX,
};
use crate::remote::{PendingWrite, RemoteSink};
use crate::traits::LocalStorage;

/// Resolves the sub-key of the question currently in view.
///
/// Called afresh on every `*_current_*` accessor; `None` means no question
/// is in view.
pub type CurrentKeyFn = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Remote endpoint a mirrored store forwards its changes to.
pub struct RemoteMirror {
    base_path: String,
    user: String,
    sink: Arc<dyn RemoteSink>,
    runtime: Handle,
}

impl RemoteMirror {
    /// Mirror onto `sink`, spawning writes on the ambient tokio runtime.
    pub fn new(
        base_path: impl Into<String>,
        user: impl Into<String>,
        sink: Arc<dyn RemoteSink>,
    ) -> StoreResult<Self> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        Self::with_runtime(base_path, user, sink, runtime)
    }

    pub fn with_runtime(
        base_path: impl Into<String>,
        user: impl Into<String>,
        sink: Arc<dyn RemoteSink>,
        runtime: Handle,
    ) -> StoreResult<Self> {
        let user = user.into();
        if !is_path_segment(&user) {
            return Err(StoreError::Config(format!(
                "remote user {user:?} is not a usable path segment"
            )));
        }
        Ok(Self {
            base_path: base_path.into(),
            user,
            sink,
            runtime,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn path(&self, ns: Namespace, sub_key: Option<&str>) -> String {
        resource_path(&self.base_path, &self.user, ns, sub_key)
    }
}

/// Where mapping-valued namespaces are persisted.
enum Backing {
    LocalOnly,
    RemoteMirrored {
        remote: RemoteMirror,
        mirror: RwLock<HashMap<Namespace, Mapping>>,
    },
}

enum RemoteOp {
    Put(String),
    Delete,
}

/// Namespaced key/value persistence for per-question study state.
pub struct KeyedObjectStore {
    local: Arc<dyn LocalStorage>,
    prefix: String,
    current_key: Option<CurrentKeyFn>,
    backing: Backing,
}

impl KeyedObjectStore {
    /// Store persisting everything to `local`.
    pub fn local_only(local: Arc<dyn LocalStorage>) -> Self {
        Self {
            local,
            prefix: DEFAULT_APP_PREFIX.to_string(),
            current_key: None,
            backing: Backing::LocalOnly,
        }
    }

    /// Store keeping synced namespaces in a mirror backed by `remote`.
    ///
    /// `local` still holds the local-only namespaces.
    pub fn remote_mirrored(local: Arc<dyn LocalStorage>, remote: RemoteMirror) -> Self {
        Self {
            local,
            prefix: DEFAULT_APP_PREFIX.to_string(),
            current_key: None,
            backing: Backing::RemoteMirrored {
                remote,
                mirror: RwLock::new(HashMap::new()),
            },
        }
    }

    /// Install the current-key resolver.
    pub fn with_current_key<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.current_key = Some(Box::new(resolver));
        self
    }

    /// Use `prefix` for local storage keys instead of the default.
    pub fn with_app_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn app_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(self.backing, Backing::RemoteMirrored { .. })
    }

    // ---- Generic operations ----

    /// The whole mapping of `ns`; empty if nothing was ever written.
    pub fn get_object(&self, ns: Namespace) -> StoreResult<Mapping> {
        ensure_mapping(ns)?;
        match self.mirror_for(ns) {
            Some((_, mirror)) => {
                let mirror = mirror.read().map_err(|_| StoreError::LockPoisoned)?;
                Ok(mirror.get(&ns).cloned().unwrap_or_default())
            }
            None => self.read_local(ns),
        }
    }

    /// The value stored at `sub_key` in `ns`, if any.
    pub fn get_entry(&self, ns: Namespace, sub_key: &str) -> StoreResult<Option<Value>> {
        ensure_mapping(ns)?;
        match self.mirror_for(ns) {
            Some((_, mirror)) => {
                let mirror = mirror.read().map_err(|_| StoreError::LockPoisoned)?;
                Ok(mirror.get(&ns).and_then(|map| map.get(sub_key)).cloned())
            }
            None => Ok(self.read_local(ns)?.remove(sub_key)),
        }
    }

    /// Replace the whole mapping of `ns`.
    pub fn replace_namespace(&self, ns: Namespace, value: Mapping) -> StoreResult<PendingWrite> {
        ensure_mapping(ns)?;
        debug!(namespace = %ns, entries = value.len(), "replacing namespace");
        match self.mirror_for(ns) {
            Some((remote, mirror)) => {
                let body = to_text(&Value::Object(value.clone()))?;
                mirror
                    .write()
                    .map_err(|_| StoreError::LockPoisoned)?
                    .insert(ns, value);
                Ok(self.dispatch(remote, remote.path(ns, None), RemoteOp::Put(body)))
            }
            None => {
                self.write_local(ns, &value)?;
                Ok(PendingWrite::completed())
            }
        }
    }

    /// Set `sub_key` in `ns` to `value`, keeping sibling sub-keys.
    ///
    /// A mirrored store sends only the changed value to the sub-key resource.
    /// Sub-keys that cannot be a path segment (empty, `.` or `..`) are sent as
    /// the whole updated mapping to the namespace resource instead.
    pub fn set_sub_key(
        &self,
        ns: Namespace,
        sub_key: &str,
        value: impl Serialize,
    ) -> StoreResult<PendingWrite> {
        ensure_mapping(ns)?;
        let value = to_value(value)?;
        debug!(namespace = %ns, sub_key, "setting sub-key");
        match self.mirror_for(ns) {
            Some((remote, mirror)) => {
                let single = if is_path_segment(sub_key) {
                    Some(to_text(&value)?)
                } else {
                    None
                };
                let mut mirror = mirror.write().map_err(|_| StoreError::LockPoisoned)?;
                let map = mirror.entry(ns).or_default();
                map.insert(sub_key.to_string(), value);
                let (path, body) = match single {
                    Some(body) => (remote.path(ns, Some(sub_key)), body),
                    None => (remote.path(ns, None), to_text(&Value::Object(map.clone()))?),
                };
                drop(mirror);
                Ok(self.dispatch(remote, path, RemoteOp::Put(body)))
            }
            None => {
                let mut map = self.read_local(ns)?;
                map.insert(sub_key.to_string(), value);
                self.write_local(ns, &map)?;
                Ok(PendingWrite::completed())
            }
        }
    }

    /// Remove `sub_key` from `ns`, keeping sibling sub-keys.
    ///
    /// Like [`set_sub_key`](Self::set_sub_key), a sub-key that cannot be a
    /// path segment is synced by sending the remaining mapping.
    pub fn clear_sub_key(&self, ns: Namespace, sub_key: &str) -> StoreResult<PendingWrite> {
        ensure_mapping(ns)?;
        debug!(namespace = %ns, sub_key, "clearing sub-key");
        match self.mirror_for(ns) {
            Some((remote, mirror)) => {
                let mut mirror = mirror.write().map_err(|_| StoreError::LockPoisoned)?;
                if let Some(map) = mirror.get_mut(&ns) {
                    map.remove(sub_key);
                }
                let (path, op) = if is_path_segment(sub_key) {
                    (remote.path(ns, Some(sub_key)), RemoteOp::Delete)
                } else {
                    let remaining = mirror.get(&ns).cloned().unwrap_or_default();
                    let body = to_text(&Value::Object(remaining))?;
                    (remote.path(ns, None), RemoteOp::Put(body))
                };
                drop(mirror);
                Ok(self.dispatch(remote, path, op))
            }
            None => {
                let mut map = self.read_local(ns)?;
                map.remove(sub_key);
                self.write_local(ns, &map)?;
                Ok(PendingWrite::completed())
            }
        }
    }

    /// Remove the whole entry of `ns`.
    pub fn clear_namespace(&self, ns: Namespace) -> StoreResult<PendingWrite> {
        debug!(namespace = %ns, "clearing namespace");
        match self.mirror_for(ns) {
            Some((remote, mirror)) => {
                mirror
                    .write()
                    .map_err(|_| StoreError::LockPoisoned)?
                    .remove(&ns);
                Ok(self.dispatch(remote, remote.path(ns, None), RemoteOp::Delete))
            }
            None => {
                self.local.remove_item(&ns.storage_key(&self.prefix))?;
                Ok(PendingWrite::completed())
            }
        }
    }

    // ---- Mirror priming ----

    /// Install a server snapshot (`{"mastery": {...}, "notes": null, ...}`)
    /// into the mirror. `null` or missing namespaces become empty.
    pub fn prime(&self, snapshot: &Value) -> StoreResult<()> {
        let Backing::RemoteMirrored { mirror, .. } = &self.backing else {
            return Err(StoreError::NotMirrored);
        };
        let mut primed = HashMap::new();
        for ns in Namespace::SYNCED {
            match snapshot.get(ns.as_str()) {
                None | Some(Value::Null) => {}
                Some(Value::Object(map)) => {
                    primed.insert(ns, map.clone());
                }
                Some(other) => {
                    return Err(StoreError::Corrupted {
                        key: ns.to_string(),
                        reason: format!("expected a JSON object, found {}", kind_of(other)),
                    })
                }
            }
        }
        debug!(namespaces = primed.len(), "primed mirror");
        *mirror.write().map_err(|_| StoreError::LockPoisoned)? = primed;
        Ok(())
    }

    /// Fetch the user's snapshot from the remote endpoint and prime the
    /// mirror with it.
    pub async fn load_remote(&self) -> StoreResult<()> {
        let Backing::RemoteMirrored { remote, .. } = &self.backing else {
            return Err(StoreError::NotMirrored);
        };
        let snapshot = remote
            .sink
            .fetch(&snapshot_path(&remote.base_path, &remote.user))
            .await?;
        self.prime(&snapshot)
    }

    // ---- Local-only data ----

    /// The color theme; empty when unset.
    pub fn get_color(&self) -> StoreResult<String> {
        Ok(self
            .local
            .get_item(&Namespace::Color.storage_key(&self.prefix))?
            .unwrap_or_default())
    }

    pub fn save_color(&self, color: &str) -> StoreResult<()> {
        self.local
            .set_item(&Namespace::Color.storage_key(&self.prefix), color)
    }

    pub fn clear_color(&self) -> StoreResult<()> {
        self.local
            .remove_item(&Namespace::Color.storage_key(&self.prefix))?;
        Ok(())
    }

    pub fn get_expanded(&self) -> StoreResult<Mapping> {
        self.get_object(Namespace::Expanded)
    }

    pub fn save_expanded(&self, value: Mapping) -> StoreResult<()> {
        self.replace_namespace(Namespace::Expanded, value)?;
        Ok(())
    }

    // ---- Mastery ----

    pub fn get_mastery(&self, key: &str) -> StoreResult<Option<Value>> {
        self.get_entry(Namespace::Mastery, key)
    }

    pub fn get_current_mastery(&self) -> StoreResult<Option<Value>> {
        match self.current_key() {
            Some(key) => self.get_mastery(&key),
            None => Ok(None),
        }
    }

    pub fn save_mastery(&self, key: &str, level: impl Serialize) -> StoreResult<PendingWrite> {
        self.set_sub_key(Namespace::Mastery, key, level)
    }

    pub fn save_current_mastery(&self, level: impl Serialize) -> StoreResult<PendingWrite> {
        match self.current_key() {
            Some(key) => self.save_mastery(&key, level),
            None => Ok(PendingWrite::completed()),
        }
    }

    pub fn clear_mastery(&self, key: &str) -> StoreResult<PendingWrite> {
        self.clear_sub_key(Namespace::Mastery, key)
    }

    pub fn clear_current_mastery(&self) -> StoreResult<PendingWrite> {
        match self.current_key() {
            Some(key) => self.clear_mastery(&key),
            None => Ok(PendingWrite::completed()),
        }
    }

    // ---- Notes ----

    pub fn get_notes(&self, key: &str) -> StoreResult<Option<Value>> {
        self.get_entry(Namespace::Notes, key)
    }

    /// Notes of the current question, kept under `"q,<current>"`.
    pub fn get_current_notes(&self) -> StoreResult<Option<Value>> {
        match self.current_key() {
            Some(key) => self.get_notes(&notes_key(&key)),
            None => Ok(None),
        }
    }

    pub fn save_notes(&self, key: &str, notes: impl Serialize) -> StoreResult<PendingWrite> {
        self.set_sub_key(Namespace::Notes, key, notes)
    }

    pub fn save_current_notes(&self, notes: impl Serialize) -> StoreResult<PendingWrite> {
        match self.current_key() {
            Some(key) => self.save_notes(&notes_key(&key), notes),
            None => Ok(PendingWrite::completed()),
        }
    }

    // ---- Highlights ----

    pub fn get_hilites(&self, key: &str) -> StoreResult<Option<Value>> {
        self.get_entry(Namespace::Hilites, key)
    }

    /// Highlights of the current question in context `prefix`, kept under
    /// `"<prefix>,<current>"`.
    pub fn get_current_hilites(&self, prefix: &str) -> StoreResult<Option<Value>> {
        match self.current_key() {
            Some(key) => self.get_hilites(&hilites_key(prefix, &key)),
            None => Ok(None),
        }
    }

    pub fn save_hilites(&self, key: &str, hilites: impl Serialize) -> StoreResult<PendingWrite> {
        self.set_sub_key(Namespace::Hilites, key, hilites)
    }

    pub fn save_current_hilites(
        &self,
        prefix: &str,
        hilites: impl Serialize,
    ) -> StoreResult<PendingWrite> {
        match self.current_key() {
            Some(key) => self.save_hilites(&hilites_key(prefix, &key), hilites),
            None => Ok(PendingWrite::completed()),
        }
    }

    // ---- Test lists ----

    pub fn get_test_list(&self, key: &str) -> StoreResult<Option<Value>> {
        self.get_entry(Namespace::TestList, key)
    }

    /// Save a test list. Await the returned write before shutting down when
    /// the list must reach the server.
    pub fn save_test_list(&self, key: &str, list: impl Serialize) -> StoreResult<PendingWrite> {
        self.set_sub_key(Namespace::TestList, key, list)
    }

    // ---- Internals ----

    fn current_key(&self) -> Option<String> {
        let Some(resolver) = &self.current_key else {
            warn!("current-key accessor used on a store without a resolver");
            return None;
        };
        let key = resolver();
        if key.is_none() {
            debug!("no current question in view");
        }
        key
    }

    fn mirror_for(&self, ns: Namespace) -> Option<(&RemoteMirror, &RwLock<HashMap<Namespace, Mapping>>)> {
        match &self.backing {
            Backing::RemoteMirrored { remote, mirror } if !ns.is_local_only() => {
                Some((remote, mirror))
            }
            _ => None,
        }
    }

    fn read_local(&self, ns: Namespace) -> StoreResult<Mapping> {
        let key = ns.storage_key(&self.prefix);
        match self.local.get_item(&key)? {
            Some(text) => parse_mapping(&key, &text),
            None => Ok(Mapping::new()),
        }
    }

    fn write_local(&self, ns: Namespace, map: &Mapping) -> StoreResult<()> {
        let text = serde_json::to_string(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.local.set_item(&ns.storage_key(&self.prefix), &text)
    }

    fn dispatch(&self, remote: &RemoteMirror, path: String, op: RemoteOp) -> PendingWrite {
        let sink = Arc::clone(&remote.sink);
        let handle = remote.runtime.spawn(async move {
            let (verb, result) = match op {
                RemoteOp::Put(body) => ("updating", sink.put(&path, body).await),
                RemoteOp::Delete => ("clearing", sink.delete(&path).await),
            };
            match result {
                Ok(()) => debug!(url = %path, "remote storage {verb} done"),
                Err(e) => warn!(url = %path, error = %e, "error {verb} remote storage"),
            }
        });
        PendingWrite::spawned(handle)
    }
}

fn ensure_mapping(ns: Namespace) -> StoreResult<()> {
    if ns.is_scalar() {
        return Err(StoreError::ScalarNamespace(ns));
    }
    Ok(())
}

impl std::fmt::Debug for KeyedObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.backing {
            Backing::LocalOnly => "local-only",
            Backing::RemoteMirrored { .. } => "remote-mirrored",
        };
        f.debug_struct("KeyedObjectStore")
            .field("prefix", &self.prefix)
            .field("mode", &mode)
            .field("has_current_key", &self.current_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStorage;
    use crate::remote::{RecordingSink, RemoteMethod};
    use serde_json::json;
    use std::sync::Mutex;

    fn local_store() -> (Arc<InMemoryStorage>, KeyedObjectStore) {
        let local = Arc::new(InMemoryStorage::new());
        let store = KeyedObjectStore::local_only(local.clone());
        (local, store)
    }

    fn mirrored_store(sink: Arc<RecordingSink>) -> KeyedObjectStore {
        let remote = RemoteMirror::new("/storage", "step2", sink).unwrap();
        KeyedObjectStore::remote_mirrored(Arc::new(InMemoryStorage::new()), remote)
    }

    fn map(value: Value) -> Mapping {
        match value {
            Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    // ---- Local-only ----

    #[test]
    fn unwritten_namespace_is_empty() {
        let (_, store) = local_store();
        for ns in [Namespace::Mastery, Namespace::Notes, Namespace::Hilites, Namespace::TestList] {
            assert!(store.get_object(ns).unwrap().is_empty());
            assert_eq!(store.get_entry(ns, "0,1").unwrap(), None);
        }
    }

    #[test]
    fn mastery_scenario() {
        let (local, store) = local_store();
        store.save_mastery("0,2", 3).unwrap();
        store.save_mastery("0,5", 5).unwrap();

        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"0,2": 3, "0,5": 5})
        );
        let raw = local.get_item("tutorme.qbank.mastery").unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), json!({"0,2": 3, "0,5": 5}));
    }

    #[test]
    fn zero_level_is_kept() {
        let (_, store) = local_store();
        store.save_mastery("0,1", 0).unwrap();
        assert_eq!(store.get_mastery("0,1").unwrap(), Some(json!(0)));
    }

    #[test]
    fn clear_sub_key_keeps_siblings() {
        let (_, store) = local_store();
        store.save_mastery("0,1", 1).unwrap();
        store.save_mastery("0,2", 2).unwrap();
        store.clear_mastery("0,1").unwrap();

        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"0,2": 2})
        );
    }

    #[test]
    fn clear_namespace_removes_key() {
        let (local, store) = local_store();
        store.save_notes("q,0,1", json!({"text": "hi"})).unwrap();
        store.clear_namespace(Namespace::Notes).unwrap();

        assert!(store.get_object(Namespace::Notes).unwrap().is_empty());
        assert_eq!(local.get_item("tutorme.qbank.notes").unwrap(), None);
    }

    #[test]
    fn replace_namespace_overwrites_everything() {
        let (_, store) = local_store();
        store.save_mastery("0,1", 1).unwrap();
        store
            .replace_namespace(Namespace::Mastery, map(json!({"1,1": 4})))
            .unwrap();
        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"1,1": 4})
        );
    }

    #[test]
    fn corrupted_local_state_propagates() {
        let (local, store) = local_store();
        local.set_item("tutorme.qbank.mastery", "{broken").unwrap();
        assert!(matches!(
            store.get_object(Namespace::Mastery),
            Err(StoreError::Corrupted { .. })
        ));
        assert!(matches!(
            store.save_mastery("0,1", 1),
            Err(StoreError::Corrupted { .. })
        ));
        // Nothing was overwritten.
        assert_eq!(
            local.get_item("tutorme.qbank.mastery").unwrap().as_deref(),
            Some("{broken")
        );
    }

    #[test]
    fn current_notes_use_q_prefix() {
        let local = Arc::new(InMemoryStorage::new());
        let store = KeyedObjectStore::local_only(local).with_current_key(|| Some("0,1".into()));
        store.save_current_notes(json!({"text": "hi"})).unwrap();

        assert_eq!(store.get_notes("q,0,1").unwrap(), Some(json!({"text": "hi"})));
        assert_eq!(store.get_current_notes().unwrap(), Some(json!({"text": "hi"})));
    }

    #[test]
    fn current_hilites_use_context_prefix() {
        let local = Arc::new(InMemoryStorage::new());
        let store = KeyedObjectStore::local_only(local).with_current_key(|| Some("0,1".into()));
        store.save_hilites("abc,0,1", json!(["span-3"])).unwrap();

        assert_eq!(store.get_current_hilites("abc").unwrap(), Some(json!(["span-3"])));
        assert_eq!(store.get_current_hilites("xyz").unwrap(), None);

        store.save_current_hilites("xyz", json!(["span-9"])).unwrap();
        assert_eq!(store.get_hilites("xyz,0,1").unwrap(), Some(json!(["span-9"])));
    }

    #[test]
    fn resolver_is_called_on_every_access() {
        let current = Arc::new(Mutex::new(Some("0,1".to_string())));
        let store = {
            let current = current.clone();
            KeyedObjectStore::local_only(Arc::new(InMemoryStorage::new()))
                .with_current_key(move || current.lock().unwrap().clone())
        };
        store.save_current_mastery(2).unwrap();
        *current.lock().unwrap() = Some("0,2".to_string());
        store.save_current_mastery(4).unwrap();

        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"0,1": 2, "0,2": 4})
        );
        assert_eq!(store.get_current_mastery().unwrap(), Some(json!(4)));
        store.clear_current_mastery().unwrap();
        assert_eq!(store.get_current_mastery().unwrap(), None);
        assert_eq!(store.get_mastery("0,1").unwrap(), Some(json!(2)));
    }

    #[test]
    fn missing_current_key_is_tolerated() {
        let store = KeyedObjectStore::local_only(Arc::new(InMemoryStorage::new()))
            .with_current_key(|| None);
        assert_eq!(store.get_current_mastery().unwrap(), None);
        assert_eq!(store.get_current_notes().unwrap(), None);
        store.save_current_notes(json!({"text": "lost"})).unwrap();
        store.clear_current_mastery().unwrap();
        assert!(store.get_object(Namespace::Notes).unwrap().is_empty());

        let no_resolver = KeyedObjectStore::local_only(Arc::new(InMemoryStorage::new()));
        assert_eq!(no_resolver.get_current_hilites("abc").unwrap(), None);
        assert!(no_resolver.save_current_mastery(1).unwrap().is_local());
    }

    #[test]
    fn color_is_a_bare_string() {
        let (local, store) = local_store();
        assert_eq!(store.get_color().unwrap(), "");
        store.save_color("#FF0000").unwrap();
        assert_eq!(store.get_color().unwrap(), "#FF0000");
        assert_eq!(
            local.get_item("tutorme.qbank.color").unwrap().as_deref(),
            Some("#FF0000")
        );
        store.clear_color().unwrap();
        assert_eq!(store.get_color().unwrap(), "");
    }

    #[test]
    fn color_rejects_mapping_operations() {
        let (_, store) = local_store();
        assert!(matches!(
            store.get_object(Namespace::Color),
            Err(StoreError::ScalarNamespace(Namespace::Color))
        ));
        assert!(matches!(
            store.set_sub_key(Namespace::Color, "k", 1),
            Err(StoreError::ScalarNamespace(_))
        ));
    }

    #[test]
    fn expanded_roundtrip() {
        let (_, store) = local_store();
        assert!(store.get_expanded().unwrap().is_empty());
        store.save_expanded(map(json!({"0": true, "3": false}))).unwrap();
        assert_eq!(store.get_expanded().unwrap().get("0"), Some(&json!(true)));
    }

    #[test]
    fn custom_prefix_is_used_for_keys() {
        let local = Arc::new(InMemoryStorage::new());
        let store = KeyedObjectStore::local_only(local.clone()).with_app_prefix("other.app");
        store.save_test_list("list1", json!(["0,1", "0,2"])).unwrap();
        assert!(local.get_item("other.app.testlist").unwrap().is_some());
        assert_eq!(store.app_prefix(), "other.app");
    }

    #[test]
    fn prime_requires_mirror() {
        let (_, store) = local_store();
        assert!(matches!(store.prime(&json!({})), Err(StoreError::NotMirrored)));
    }

    #[test]
    fn mirrored_store_needs_runtime() {
        let sink = Arc::new(RecordingSink::new());
        assert!(matches!(
            RemoteMirror::new("/storage", "u", sink),
            Err(StoreError::NoRuntime)
        ));
    }

    // ---- Remote-mirrored ----

    #[tokio::test]
    async fn mirror_updates_before_network_resolves() {
        let sink = Arc::new(RecordingSink::gated());
        let store = mirrored_store(sink.clone());

        let write = store.save_mastery("0,2", 3).unwrap();
        assert_eq!(store.get_mastery("0,2").unwrap(), Some(json!(3)));
        assert!(sink.completed().is_empty());

        sink.release(1);
        write.wait().await;
        assert_eq!(
            sink.completed(),
            vec![crate::remote::RemoteRequest {
                method: RemoteMethod::Put,
                path: "/storage/step2/mastery/0,2".into(),
                body: Some("3".into()),
            }]
        );
    }

    #[tokio::test]
    async fn sub_key_put_carries_only_changed_value() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());

        store.save_mastery("0,2", 3).unwrap().wait().await;
        store.save_mastery("0,5", 5).unwrap().wait().await;

        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"0,2": 3, "0,5": 5})
        );
        let bodies: Vec<_> = sink.completed().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, vec![Some("3".to_string()), Some("5".to_string())]);
    }

    #[tokio::test]
    async fn replace_sends_whole_mapping_to_namespace_url() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());
        store
            .replace_namespace(Namespace::TestList, map(json!({"a": [1, 2]})))
            .unwrap()
            .wait()
            .await;

        let req = &sink.completed()[0];
        assert_eq!(req.path, "/storage/step2/testlist");
        assert_eq!(req.body.as_deref(), Some(r#"{"a":[1,2]}"#));
    }

    #[tokio::test]
    async fn clears_issue_deletes() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());
        store.save_notes("q,0,1", json!({"text": "a"})).unwrap();
        store.save_notes("q,0,2", json!({"text": "b"})).unwrap();

        store.clear_sub_key(Namespace::Notes, "q,0,1").unwrap().wait().await;
        assert_eq!(
            Value::Object(store.get_object(Namespace::Notes).unwrap()),
            json!({"q,0,2": {"text": "b"}})
        );

        store.clear_namespace(Namespace::Notes).unwrap().wait().await;
        assert!(store.get_object(Namespace::Notes).unwrap().is_empty());

        let deletes: Vec<_> = sink
            .received()
            .into_iter()
            .filter(|r| r.method == RemoteMethod::Delete)
            .map(|r| r.path)
            .collect();
        assert_eq!(
            deletes,
            vec!["/storage/step2/notes/q,0,1", "/storage/step2/notes"]
        );
    }

    #[tokio::test]
    async fn awkward_sub_keys_stay_in_one_segment() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());
        store.save_hilites(r"ctx\1,0,1", json!(["x"])).unwrap().wait().await;
        store.save_notes("a/b?c", json!("n")).unwrap().wait().await;

        let paths: Vec<_> = sink.completed().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec!["/storage/step2/hilites/ctx%5C1,0,1", "/storage/step2/notes/a%2Fb%3Fc"]
        );
    }

    #[tokio::test]
    async fn dot_and_empty_sub_keys_sync_the_whole_mapping() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());
        store.save_hilites("abc,0,1", json!(["s"])).unwrap().wait().await;
        store.save_hilites("..", json!(["y"])).unwrap().wait().await;
        store.save_mastery("", 3).unwrap().wait().await;
        store.clear_sub_key(Namespace::Hilites, "..").unwrap().wait().await;

        assert_eq!(store.get_mastery("").unwrap(), Some(json!(3)));
        let calls: Vec<_> = sink
            .completed()
            .into_iter()
            .map(|r| (r.method, r.path, r.body))
            .collect();
        assert_eq!(
            calls,
            vec![
                (
                    RemoteMethod::Put,
                    "/storage/step2/hilites/abc,0,1".to_string(),
                    Some(r#"["s"]"#.to_string())
                ),
                (
                    RemoteMethod::Put,
                    "/storage/step2/hilites".to_string(),
                    Some(r#"{"..":["y"],"abc,0,1":["s"]}"#.to_string())
                ),
                (
                    RemoteMethod::Put,
                    "/storage/step2/mastery".to_string(),
                    Some(r#"{"":3}"#.to_string())
                ),
                (
                    RemoteMethod::Put,
                    "/storage/step2/hilites".to_string(),
                    Some(r#"{"abc,0,1":["s"]}"#.to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn mirror_rejects_unusable_user() {
        for user in ["", ".", ".."] {
            let sink = Arc::new(RecordingSink::new());
            assert!(matches!(
                RemoteMirror::new("/storage", user, sink),
                Err(StoreError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn get_entry_reads_mirror_without_consuming_it() {
        let store = mirrored_store(Arc::new(RecordingSink::new()));
        store.save_mastery("0,1", 2).unwrap();
        assert_eq!(store.get_entry(Namespace::Mastery, "0,1").unwrap(), Some(json!(2)));
        assert_eq!(store.get_entry(Namespace::Mastery, "0,1").unwrap(), Some(json!(2)));
        assert_eq!(store.get_entry(Namespace::Notes, "0,1").unwrap(), None);
        assert!(matches!(
            store.get_entry(Namespace::Color, "k"),
            Err(StoreError::ScalarNamespace(_))
        ));
    }

    #[tokio::test]
    async fn remote_failure_keeps_mirror() {
        let sink = Arc::new(RecordingSink::new());
        sink.fail_with_status(503, "Service Unavailable");
        let store = mirrored_store(sink.clone());

        let write = store.save_test_list("t1", json!(["0,1"])).unwrap();
        write.wait().await;

        assert!(sink.completed().is_empty());
        assert_eq!(sink.received().len(), 1);
        assert_eq!(store.get_test_list("t1").unwrap(), Some(json!(["0,1"])));
    }

    #[tokio::test]
    async fn local_only_namespaces_bypass_remote() {
        let sink = Arc::new(RecordingSink::new());
        let store = mirrored_store(sink.clone());
        store.save_color("#00FF00").unwrap();
        let write = store.replace_namespace(Namespace::Expanded, map(json!({"1": true}))).unwrap();

        assert!(write.is_local());
        assert_eq!(store.get_color().unwrap(), "#00FF00");
        assert_eq!(store.get_expanded().unwrap().get("1"), Some(&json!(true)));
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn load_remote_primes_mirror() {
        let sink = Arc::new(RecordingSink::new());
        sink.set_snapshot(json!({
            "mastery": {"0,1": 4},
            "notes": null,
            "hilites": {"abc,0,1": ["s"]},
            "testlist": null,
        }));
        let store = mirrored_store(sink.clone()).with_current_key(|| Some("0,1".into()));
        store.save_notes("q,9,9", json!("stale")).unwrap();

        store.load_remote().await.unwrap();

        assert_eq!(store.get_current_mastery().unwrap(), Some(json!(4)));
        assert_eq!(store.get_current_hilites("abc").unwrap(), Some(json!(["s"])));
        assert!(store.get_object(Namespace::Notes).unwrap().is_empty());
    }

    #[tokio::test]
    async fn prime_rejects_non_object_namespace() {
        let store = mirrored_store(Arc::new(RecordingSink::new()));
        let err = store.prime(&json!({"mastery": [1, 2]})).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { ref key, .. } if key == "mastery"));
    }

    #[tokio::test]
    async fn rapid_saves_are_last_write_wins_in_mirror() {
        let sink = Arc::new(RecordingSink::gated());
        let store = mirrored_store(sink.clone());
        let first = store.save_mastery("0,1", 1).unwrap();
        let second = store.save_mastery("0,1", 2).unwrap();
        assert_eq!(store.get_mastery("0,1").unwrap(), Some(json!(2)));

        sink.release(2);
        first.wait().await;
        second.wait().await;
        assert_eq!(sink.completed().len(), 2);
        assert!(store.is_mirrored());
    }

    // ---- Properties ----

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn sub_key() -> impl Strategy<Value = String> {
            "[a-z0-9,]{1,8}"
        }

        fn json_leaf() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                any::<bool>().prop_map(Value::from),
                "[a-zA-Z #]{0,12}".prop_map(Value::from),
            ]
        }

        proptest! {
            #[test]
            fn set_then_get_keeps_siblings(
                siblings in proptest::collection::btree_map(sub_key(), json_leaf(), 0..6),
                key in sub_key(),
                value in json_leaf(),
            ) {
                let (_, store) = local_store();
                for (k, v) in &siblings {
                    store.set_sub_key(Namespace::Hilites, k, v).unwrap();
                }
                store.set_sub_key(Namespace::Hilites, &key, &value).unwrap();

                prop_assert_eq!(store.get_entry(Namespace::Hilites, &key).unwrap(), Some(value));
                let all = store.get_object(Namespace::Hilites).unwrap();
                for (k, v) in &siblings {
                    if *k != key {
                        prop_assert_eq!(all.get(k), Some(v));
                    }
                }
            }

            #[test]
            fn clear_removes_exactly_one_key(
                entries in proptest::collection::btree_map(sub_key(), json_leaf(), 1..6),
            ) {
                let (_, store) = local_store();
                for (k, v) in &entries {
                    store.set_sub_key(Namespace::TestList, k, v).unwrap();
                }
                let victim = entries.keys().next().unwrap().clone();
                store.clear_sub_key(Namespace::TestList, &victim).unwrap();

                let all = store.get_object(Namespace::TestList).unwrap();
                prop_assert!(!all.contains_key(&victim));
                prop_assert_eq!(all.len(), entries.len() - 1);
            }
        }
    }
}
