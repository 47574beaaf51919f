//! Core types, config, and conversation storage for the Solar Router.
//!
//! This crate contains:
//! - **types**: `RouterRequest`, `RouterResponse`, `ConversationRecord`, and the
//!   small enums (`Channel`, `Mode`, `DecisionKind`) that make up the wire
//!   contract described by the router's stdin/stdout and WebSocket protocols.
//! - **error**: the stable `error_code` taxonomy as a typed enum.
//! - **config**: the on-disk config schema + env var override loader.
//! - **conversation**: the append-only per-conversation JSONL store.
//! - **idutil**: conversation id sanitization and ASCII-safe JSON escaping.

pub mod config;
pub mod conversation;
pub mod error;
pub mod idutil;
pub mod types;

pub use config::{load_config, Config};
pub use conversation::ConversationStore;
pub use error::{ErrorCode, RouterError};
pub use types::{
    Channel, ConversationRecord, Decision, DecisionKind, Mode, Provider, RouterRequest,
    RouterResponse,
};
