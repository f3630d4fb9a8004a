//! Server-side settings: one JSON document per user and namespace.
//!
//! Documents are kept as text in a [`LocalStorage`] under
//! `"{prefix}.{user}.{namespace}"`. Sub-key updates parse the stored object,
//! change one index and write the object back.

use std::sync::{Arc, Mutex};

use qbank_store::mapping::{kind_of, parse_mapping, to_text};
use qbank_store::{LocalStorage, Namespace};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ServerError, ServerResult};

pub struct SettingsStore {
    storage: Arc<dyn LocalStorage>,
    prefix: String,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn LocalStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Resolve a namespace from the URL; only synced namespaces are served.
    pub fn namespace(name: &str) -> ServerResult<Namespace> {
        match name.parse::<Namespace>() {
            Ok(ns) if Namespace::SYNCED.contains(&ns) => Ok(ns),
            _ => Err(ServerError::UnknownNamespace(name.to_string())),
        }
    }

    fn key(&self, user: &str, ns: Namespace) -> String {
        format!("{}.{}.{}", self.prefix, user, ns)
    }

    /// All synced namespaces of `user`; unset ones are `null`.
    pub fn snapshot(&self, user: &str) -> ServerResult<Value> {
        let mut doc = Map::new();
        for ns in Namespace::SYNCED {
            let key = self.key(user, ns);
            let value = match self.storage.get_item(&key)? {
                Some(text) => serde_json::from_str(&text).map_err(|e| {
                    qbank_store::StoreError::Corrupted {
                        key,
                        reason: e.to_string(),
                    }
                })?,
                None => Value::Null,
            };
            doc.insert(ns.to_string(), value);
        }
        Ok(Value::Object(doc))
    }

    /// Replace the whole document of `ns` with `body`, which must be a JSON
    /// object.
    pub fn replace(&self, user: &str, ns: Namespace, body: &str) -> ServerResult<()> {
        let value = parse_body(body)?;
        if !value.is_object() {
            return Err(ServerError::InvalidBody(format!(
                "{ns} must be a JSON object, found {}",
                kind_of(&value)
            )));
        }
        let _guard = self.lock()?;
        debug!(user, namespace = %ns, "replacing settings document");
        self.storage.set_item(&self.key(user, ns), &to_text(&value)?)?;
        Ok(())
    }

    pub fn clear(&self, user: &str, ns: Namespace) -> ServerResult<()> {
        let _guard = self.lock()?;
        debug!(user, namespace = %ns, "clearing settings document");
        self.storage.remove_item(&self.key(user, ns))?;
        Ok(())
    }

    /// Set `index` in the document of `ns` to `body`.
    pub fn set_index(&self, user: &str, ns: Namespace, index: &str, body: &str) -> ServerResult<()> {
        let value = parse_body(body)?;
        let _guard = self.lock()?;
        let key = self.key(user, ns);
        let mut doc = self.load_object(&key)?;
        doc.insert(index.to_string(), value);
        debug!(user, namespace = %ns, index, "updating settings entry");
        self.storage.set_item(&key, &to_text(&Value::Object(doc))?)?;
        Ok(())
    }

    /// Remove `index` from the document of `ns`, if present.
    pub fn delete_index(&self, user: &str, ns: Namespace, index: &str) -> ServerResult<()> {
        let _guard = self.lock()?;
        let key = self.key(user, ns);
        let mut doc = self.load_object(&key)?;
        if doc.remove(index).is_some() {
            debug!(user, namespace = %ns, index, "removing settings entry");
            self.storage.set_item(&key, &to_text(&Value::Object(doc))?)?;
        }
        Ok(())
    }

    fn load_object(&self, key: &str) -> ServerResult<Map<String, Value>> {
        Ok(match self.storage.get_item(key)? {
            Some(text) => parse_mapping(key, &text)?,
            None => Map::new(),
        })
    }

    fn lock(&self) -> ServerResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ServerError::Internal("settings lock poisoned".into()))
    }
}

fn parse_body(body: &str) -> ServerResult<Value> {
    serde_json::from_str(body).map_err(|e| ServerError::InvalidBody(e.to_string()))
}
