//! The conversation store's abstract interface.
//!
//! An interface boundary, not an implementation: `ob-gateway` provides an
//! in-memory backend and a disabled stand-in; a Redis-backed implementation
//! is declared but not built. Swapping backends must never touch the
//! orchestrator, so this trait is the only thing the orchestrator is
//! allowed to depend on.

use crate::error::Result;
use crate::model::StoredTurn;

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fails with [`crate::error::Error::NotFound`] when the id is missing
    /// or has expired, and with `Error::NotImplemented`/`Unavailable`-shaped
    /// errors when the backend is disabled.
    async fn get(&self, response_id: &str) -> Result<StoredTurn>;

    async fn put(&self, response_id: String, turn: StoredTurn, ttl_seconds: u64) -> Result<()>;

    /// Idempotent: deleting a missing id returns `Ok(false)`, never an
    /// error.
    async fn delete(&self, response_id: &str) -> Result<bool>;
}
