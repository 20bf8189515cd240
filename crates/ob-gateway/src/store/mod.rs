pub mod disabled;
pub mod memory;

use std::sync::Arc;

use ob_domain::config::{StoreBackend, StoreConfig};
use ob_domain::error::{Error, Result};
use ob_domain::store::ConversationStore;

/// Build the configured [`ConversationStore`] backend. Redis is declared
/// in config but not implemented here; selecting it at runtime fails fast
/// instead of silently falling back to memory.
pub fn build(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(memory::MemoryStore::new())),
        StoreBackend::Disabled => Ok(Arc::new(disabled::DisabledStore)),
        StoreBackend::Redis => Err(Error::NotImplemented(
            "redis conversation store backend is not built into this binary".into(),
        )),
    }
}
