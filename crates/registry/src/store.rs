use async_trait::async_trait;

use crate::Result;

/// A namespaced key/value store with atomic single-key put and get.
///
/// Keys are plain strings; the registry builds them as
/// `<namespace>/<service>/<field>`. Implementations must be thread-safe.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Reads the value stored under `key`.
    ///
    /// Returns None if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

#[async_trait]
impl<T: CoordinationStore + ?Sized> CoordinationStore for std::sync::Arc<T> {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
}
