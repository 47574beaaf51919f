//! Transport Gateway: the HTTP Webhook Bridge (§4.8) and WebSocket Bridge
//! (§4.7) sitting in front of the in-process Router.
//!
//! # Modules
//! - [`state::GatewayState`] — shared Router handle, dedup state, HTTP client.
//! - [`dedup::DedupStore`] — chat-bot at-most-once processing within a TTL.
//! - [`http`] — multi-channel webhook ingress (`axum::Router` builder).
//! - [`ws`] — WebSocket frame protocol + keepalive (`axum::Router` builder).

pub mod dedup;
pub mod http;
pub mod state;
pub mod ws;

pub use dedup::DedupStore;
pub use state::GatewayState;
