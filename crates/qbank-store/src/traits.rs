use crate::error::StoreResult;

/// Persistent string key/value storage, shaped like a browser's local storage.
///
/// All implementations must satisfy these invariants:
/// - Values are opaque text; the storage never interprets them.
/// - A successful `set_item` is visible to every later `get_item`.
/// - All I/O errors are propagated, never silently ignored.
pub trait LocalStorage: Send + Sync {
    /// Read the text stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Returns `true` if it existed.
    fn remove_item(&self, key: &str) -> StoreResult<bool>;

    /// All stored keys, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Stored keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}
