//! In-process conversation store: a `parking_lot::RwLock` over a
//! `HashMap`, with expiry checked lazily on read rather than via a
//! background sweeper.

use std::collections::HashMap;

use parking_lot::RwLock;

use ob_domain::error::{Error, Result};
use ob_domain::model::StoredTurn;
use ob_domain::store::ConversationStore;

struct Entry {
    turn: StoredTurn,
    expires_at: i64,
}

pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, response_id: &str) -> Result<StoredTurn> {
        let mut entries = self.entries.write();
        match entries.get(response_id) {
            Some(entry) if entry.expires_at > Self::now() => Ok(entry.turn.clone()),
            Some(_) => {
                entries.remove(response_id);
                Err(Error::NotFound(format!("response '{response_id}' has expired")))
            }
            None => Err(Error::NotFound(format!("no stored response '{response_id}'"))),
        }
    }

    async fn put(&self, response_id: String, turn: StoredTurn, ttl_seconds: u64) -> Result<()> {
        let expires_at = Self::now() + ttl_seconds as i64;
        self.entries.write().insert(response_id, Entry { turn, expires_at });
        Ok(())
    }

    async fn delete(&self, response_id: &str) -> Result<bool> {
        Ok(self.entries.write().remove(response_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ob_domain::model::ToolMap;

    fn turn() -> StoredTurn {
        StoredTurn {
            messages: Vec::new(),
            tool_map: ToolMap::new(),
            model: "gpt-4.1".into(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.put("resp_1".into(), turn(), 60).await.unwrap();
        let got = store.get("resp_1").await.unwrap();
        assert_eq!(got.model, "gpt-4.1");
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("resp_missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_entry_is_not_found_and_evicted() {
        let store = MemoryStore::new();
        store.put("resp_1".into(), turn(), 0).await.unwrap();
        // ttl_seconds = 0 expires immediately relative to "now" comparisons
        // using `>`, not `>=`.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let err = store.get("resp_1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("resp_1".into(), turn(), 60).await.unwrap();
        assert!(store.delete("resp_1").await.unwrap());
        assert!(!store.delete("resp_1").await.unwrap());
    }
}
