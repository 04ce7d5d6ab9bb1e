use {async_trait::async_trait, dashmap::DashMap};

use crate::{entry::SessionEntry, error::Result};

/// Key-value access to session entries.
///
/// Implementations own persistence and its failure modes. Callers treat
/// entries as snapshots: read, modify, write back whole values.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SessionEntry>>;
    async fn put(&self, key: &str, entry: SessionEntry) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// All known session keys, unordered.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Process-local store for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, SessionEntry>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<SessionEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, entry: SessionEntry) -> Result<()> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemorySessionStore::new();
        let mut entry = SessionEntry::new();
        entry.channel = Some("telegram".into());

        store.put("agent:main:main", entry.clone()).await.unwrap();
        let loaded = store.get("agent:main:main").await.unwrap().unwrap();
        assert_eq!(loaded, entry);
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_forgets_the_entry() {
        let store = InMemorySessionStore::new();
        store.put("k", SessionEntry::new()).await.unwrap();
        assert_eq!(store.len(), 1);

        store.remove("k").await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_lists_every_session() {
        let store = InMemorySessionStore::new();
        store.put("a", SessionEntry::new()).await.unwrap();
        store.put("b", SessionEntry::new()).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn put_overwrites_in_place() {
        let store = InMemorySessionStore::new();
        store.put("k", SessionEntry::new()).await.unwrap();

        let mut updated = SessionEntry::new();
        updated.record_delivery("slack", "U123");
        store.put("k", updated.clone()).await.unwrap();

        let loaded = store.get("k").await.unwrap().unwrap();
        assert_eq!(loaded.last_channel.as_deref(), Some("slack"));
        assert_eq!(store.len(), 1);
    }
}
