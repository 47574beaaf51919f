//! The stable `error_code` taxonomy.
//!
//! Every failure that reaches the canonical envelope carries one of these
//! codes. Bridges never synthesize new codes when a structured one is
//! already available — they only wrap transport-level failures with
//! `bridge_error` / `router_crashed`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable wire string for each failure category (see spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingInput,
    InvalidJson,
    MissingText,
    InvalidMode,
    UnsupportedProvider,
    AsyncTasksDisabled,
    AsyncDraftFailed,
    ProviderLockedFailed,
    AllProvidersFailed,
    DecisionEngineFailed,
    RouterCrashed,
    RouterTimeout,
    InvalidPath,
    BridgeError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingInput => "missing_input",
            ErrorCode::InvalidJson => "invalid_json",
            ErrorCode::MissingText => "missing_text",
            ErrorCode::InvalidMode => "invalid_mode",
            ErrorCode::UnsupportedProvider => "unsupported_provider",
            ErrorCode::AsyncTasksDisabled => "async_tasks_disabled",
            ErrorCode::AsyncDraftFailed => "async_draft_failed",
            ErrorCode::ProviderLockedFailed => "provider_locked_failed",
            ErrorCode::AllProvidersFailed => "all_providers_failed",
            ErrorCode::DecisionEngineFailed => "decision_engine_failed",
            ErrorCode::RouterCrashed => "router_crashed",
            ErrorCode::RouterTimeout => "router_timeout",
            ErrorCode::InvalidPath => "invalid_path",
            ErrorCode::BridgeError => "bridge_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with both a stable code and a human-readable message, ready to
/// drop straight into a `RouterResponse`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RouterError {
    pub code: ErrorCode,
    pub message: String,
}

impl RouterError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_json() {
        let v = serde_json::to_value(ErrorCode::AsyncTasksDisabled).unwrap();
        assert_eq!(v, serde_json::json!("async_tasks_disabled"));
    }

    #[test]
    fn as_str_matches_serde_rename() {
        for code in [
            ErrorCode::MissingInput,
            ErrorCode::ProviderLockedFailed,
            ErrorCode::RouterTimeout,
        ] {
            let serialized = serde_json::to_value(code).unwrap();
            assert_eq!(serialized, serde_json::Value::String(code.as_str().into()));
        }
    }
}
