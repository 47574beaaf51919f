//! Wire types for the router's stdin/stdout protocol, the WebSocket frame
//! protocol, and the HTTP webhook envelopes. See spec §3 and §6.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Origin of an inbound request. Unknown values normalize to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Telegram,
    #[serde(rename = "n8n")]
    N8n,
    #[serde(rename = "async-task")]
    AsyncTask,
    #[serde(other)]
    Other,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::N8n => "n8n",
            Channel::AsyncTask => "async-task",
            Channel::Other => "other",
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Other
    }
}

/// Policy selector: `auto` lets the AI classify, `direct_only` forces an
/// immediate reply, `async_only` creates a deferred task without an AI call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    DirectOnly,
    AsyncOnly,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::DirectOnly => "direct_only",
            Mode::AsyncOnly => "async_only",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Auto
    }
}

/// One of the three supported AI provider CLIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Codex,
    Claude,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Codex => "codex",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codex" => Some(Provider::Codex),
            "claude" => Some(Provider::Claude),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the router's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    DirectReply,
    AsyncDraftProposal,
    AsyncDraftCreated,
    AsyncActivationNeeded,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::DirectReply => "direct_reply",
            DecisionKind::AsyncDraftProposal => "async_draft_proposal",
            DecisionKind::AsyncDraftCreated => "async_draft_created",
            DecisionKind::AsyncActivationNeeded => "async_activation_needed",
        }
    }

    /// Parses a decision kind from AI-emitted JSON, returning `None` for any
    /// string outside the valid set (callers degrade to `DirectReply`).
    pub fn from_str_strict(s: &str) -> Option<Self> {
        match s {
            "direct_reply" => Some(DecisionKind::DirectReply),
            "async_draft_proposal" => Some(DecisionKind::AsyncDraftProposal),
            "async_draft_created" => Some(DecisionKind::AsyncDraftCreated),
            "async_activation_needed" => Some(DecisionKind::AsyncActivationNeeded),
            _ => None,
        }
    }
}

/// Input at the policy boundary (spec §3).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterRequest {
    pub request_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RouterRequest {
    /// The effective conversation identifier: `user_id` if nonempty, else
    /// `session_id`, else `"default"` — sanitized separately by the
    /// Conversation Store (see `idutil::sanitize_id`).
    pub fn conversation_id(&self) -> &str {
        if !self.user_id.is_empty() {
            &self.user_id
        } else if !self.session_id.is_empty() {
            &self.session_id
        } else {
            "default"
        }
    }
}

/// `{kind, task_id, priority_suggested}` — part of the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_suggested: Option<String>,
}

impl Decision {
    pub fn direct_reply() -> Self {
        Self {
            kind: DecisionKind::DirectReply,
            task_id: None,
            priority_suggested: None,
        }
    }
}

/// Output of the router (spec §3). Always emitted, on every path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterResponse {
    pub status: ResponseStatus,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<Provider>,
    pub reply_text: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failed,
}

impl RouterResponse {
    /// Builds the canonical failure envelope. Always has a real `error_code`.
    pub fn failure(request_id: impl Into<String>, code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            request_id: request_id.into(),
            provider_used: None,
            reply_text: String::new(),
            decision: Decision::direct_reply(),
            error_code: Some(code),
            error: Some(error.into()),
        }
    }

    /// Like [`Self::failure`], but echoes the provider that was locked in
    /// and failed (§8 scenario 4: `provider_locked_failed` still reports
    /// `provider_used`).
    pub fn failure_with_provider(
        request_id: impl Into<String>,
        provider: Provider,
        code: ErrorCode,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider_used: Some(provider),
            ..Self::failure(request_id, code, error)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ResponseStatus::Success)
    }
}

/// A single turn persisted by the Conversation Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_channel_normalizes_to_other() {
        let v: Channel = serde_json::from_str("\"whatsapp\"").unwrap();
        assert_eq!(v, Channel::Other);
    }

    #[test]
    fn known_channels_round_trip() {
        for (raw, expected) in [
            ("\"telegram\"", Channel::Telegram),
            ("\"n8n\"", Channel::N8n),
            ("\"async-task\"", Channel::AsyncTask),
        ] {
            let v: Channel = serde_json::from_str(raw).unwrap();
            assert_eq!(v, expected);
            assert_eq!(serde_json::to_string(&v).unwrap(), raw);
        }
    }

    #[test]
    fn conversation_id_prefers_user_id() {
        let req = RouterRequest {
            request_id: "r1".into(),
            session_id: "s1".into(),
            user_id: "u1".into(),
            text: "hi".into(),
            channel: Channel::Other,
            mode: Mode::Auto,
            provider: None,
            metadata: None,
        };
        assert_eq!(req.conversation_id(), "u1");
    }

    #[test]
    fn conversation_id_falls_back_to_default() {
        let req = RouterRequest {
            request_id: "r1".into(),
            session_id: String::new(),
            user_id: String::new(),
            text: "hi".into(),
            channel: Channel::Other,
            mode: Mode::Auto,
            provider: None,
            metadata: None,
        };
        assert_eq!(req.conversation_id(), "default");
    }

    #[test]
    fn decision_kind_rejects_unknown_strings() {
        assert!(DecisionKind::from_str_strict("bogus").is_none());
        assert_eq!(
            DecisionKind::from_str_strict("async_draft_created"),
            Some(DecisionKind::AsyncDraftCreated)
        );
    }
}
