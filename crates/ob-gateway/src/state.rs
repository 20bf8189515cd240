//! Shared application state threaded through every axum handler: one
//! `Arc`-wrapped struct built once at startup and cloned cheaply per
//! request.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use ob_domain::config::Config;
use ob_domain::store::ConversationStore;
use ob_upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<UpstreamClient>,
    pub store: Arc<dyn ConversationStore>,
    /// Total `/v1/responses` requests served since startup, surfaced by `/metrics`.
    pub requests_total: Arc<AtomicU64>,
}
