pub mod backoff;
pub mod client;
pub mod sse;

pub use client::{UpstreamClient, UpstreamResponse};
pub use sse::SseFrame;
