//! Stand-in used when `store.backend = "disabled"`. Every
//! `previous_response_id` lookup fails, so the orchestrator degrades to
//! treating every request as a fresh turn with no history to rehydrate.

use ob_domain::error::{Error, Result};
use ob_domain::model::StoredTurn;
use ob_domain::store::ConversationStore;

pub struct DisabledStore;

#[async_trait::async_trait]
impl ConversationStore for DisabledStore {
    async fn get(&self, response_id: &str) -> Result<StoredTurn> {
        Err(Error::NotFound(format!(
            "conversation store is disabled; '{response_id}' cannot be rehydrated"
        )))
    }

    async fn put(&self, _response_id: String, _turn: StoredTurn, _ttl_seconds: u64) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _response_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_always_not_found() {
        let store = DisabledStore;
        assert!(matches!(store.get("resp_1").await.unwrap_err(), Error::NotFound(_)));
    }

    #[tokio::test]
    async fn put_is_a_no_op_success() {
        let store = DisabledStore;
        let turn = StoredTurn {
            messages: Vec::new(),
            tool_map: ob_domain::model::ToolMap::new(),
            model: "m".into(),
            created_at: 0,
        };
        assert!(store.put("resp_1".into(), turn, 60).await.is_ok());
    }

    #[tokio::test]
    async fn delete_always_false() {
        let store = DisabledStore;
        assert!(!store.delete("resp_1").await.unwrap());
    }
}
