//! The Router — orchestrates one request end to end (§4.6).
//!
//! Ties together the Prompt Builder, the provider layer (strict/fallback
//! execution), the Decision Engine, the Deferred Task Creator, and the
//! Conversation Store. Every path out of [`Router::handle`] returns a
//! `RouterResponse`; nothing panics or propagates a bare error past here.

use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use router_core::error::ErrorCode;
use router_core::types::{
    Channel, Decision, DecisionKind, Mode, Provider, ResponseStatus, RouterRequest, RouterResponse,
};
use router_core::ConversationStore;
use router_providers::{DeferredTaskCreator, ProviderRunner};

use crate::decision::DecisionEngine;
use crate::prompt::PromptBuilder;

/// Maximum length, in characters, of the title derived from `text` when a
/// deferred task is materialized without one (§4.6 step 3 / step 8).
const TITLE_CHARS: usize = 80;

pub struct Router {
    provider_runner: ProviderRunner,
    task_creator: DeferredTaskCreator,
    conversation_store: ConversationStore,
    prompt_builder: PromptBuilder,
    providers_config: router_core::config::ProvidersConfig,
    context_turns: u32,
    async_tasks_enabled: bool,
}

impl Router {
    pub fn new(config: &router_core::Config, repo_root: PathBuf, runtime_dir: PathBuf) -> Self {
        let prompt_builder = PromptBuilder::from_file(config.router.system_prompt_file.as_deref());
        Self {
            provider_runner: ProviderRunner::new(repo_root.clone()),
            task_creator: DeferredTaskCreator::new(repo_root, config.router.task_creator_cmd.clone()),
            conversation_store: ConversationStore::new(runtime_dir),
            prompt_builder,
            providers_config: config.providers.clone(),
            context_turns: config.router.context_turns,
            async_tasks_enabled: config.features.async_tasks,
        }
    }

    /// Parses and validates a raw JSON payload into a [`RouterRequest`],
    /// step 1 of §4.6. Returns the failure envelope directly on any
    /// validation error so callers never need to synthesize error codes
    /// themselves.
    pub fn parse_request(raw: &str) -> Result<RouterRequest, RouterResponse> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RouterResponse::failure("", ErrorCode::InvalidJson, format!("invalid JSON: {e}")))?;

        let obj = value.as_object().ok_or_else(|| {
            RouterResponse::failure("", ErrorCode::MissingInput, "payload must be a JSON object")
        })?;

        let request_id = obj
            .get("request_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let text = obj.get("text").and_then(Value::as_str).unwrap_or("");
        if text.trim().is_empty() {
            return Err(RouterResponse::failure(
                request_id,
                ErrorCode::MissingText,
                "text is required and must be non-empty",
            ));
        }

        let mode = match obj.get("mode").and_then(Value::as_str) {
            None => Mode::Auto,
            Some("auto") => Mode::Auto,
            Some("direct_only") => Mode::DirectOnly,
            Some("async_only") => Mode::AsyncOnly,
            Some(other) => {
                return Err(RouterResponse::failure(
                    request_id,
                    ErrorCode::InvalidMode,
                    format!("invalid mode: {other}"),
                ))
            }
        };

        let provider = match obj.get("provider").and_then(Value::as_str) {
            None => None,
            Some(s) => match Provider::from_str_loose(s) {
                Some(p) => Some(p),
                None => {
                    return Err(RouterResponse::failure(
                        request_id,
                        ErrorCode::UnsupportedProvider,
                        format!("unsupported provider: {s}"),
                    ))
                }
            },
        };

        let channel = match obj.get("channel").and_then(Value::as_str) {
            Some("telegram") => Channel::Telegram,
            Some("n8n") => Channel::N8n,
            Some("async-task") => Channel::AsyncTask,
            _ => Channel::Other,
        };

        let session_id = obj.get("session_id").and_then(Value::as_str).unwrap_or("").to_string();
        let user_id = obj.get("user_id").and_then(Value::as_str).unwrap_or("").to_string();
        let metadata = obj.get("metadata").cloned();

        Ok(RouterRequest {
            request_id,
            session_id,
            user_id,
            text: text.to_string(),
            channel,
            mode,
            provider,
            metadata,
        })
    }

    /// Runs the full algorithm of §4.6 against an already-validated request.
    pub async fn handle(&self, request: RouterRequest) -> RouterResponse {
        let conversation_id = request.conversation_id().to_string();

        if request.mode == Mode::AsyncOnly {
            return self.handle_async_only(&request, &conversation_id).await;
        }

        let recent = self
            .conversation_store
            .load_recent(&conversation_id, self.context_turns as usize);
        let prompt = self
            .prompt_builder
            .build(&conversation_id, request.channel, request.mode, &recent, &request.text);

        let (provider_used, ai_output) = match self.run_ai(&request, &prompt).await {
            Ok(pair) => pair,
            Err(response) => return response,
        };

        let decision_channel = request.channel;
        let outcome = DecisionEngine::decide(request.mode, decision_channel, Some(ai_output.as_str()));

        let mut reply_text = if request.mode == Mode::Auto && decision_channel != Channel::AsyncTask {
            outcome.parsed_reply_text.clone().unwrap_or_else(|| ai_output.clone())
        } else {
            ai_output.clone()
        };

        let mut decision = outcome.decision;

        if decision.kind == DecisionKind::AsyncDraftCreated && decision.task_id.is_none() {
            if self.async_tasks_enabled {
                let title: String = request.text.chars().take(TITLE_CHARS).collect();
                match self.task_creator.create(&title, &request.text).await {
                    Ok(task_id) => decision.task_id = Some(task_id),
                    Err(e) => {
                        warn!(error = %e, "deferred task creation failed, degrading to direct_reply");
                        decision = Decision::direct_reply();
                        reply_text = format!(
                            "{reply_text}\n\n(note: could not create a deferred task: {e})"
                        );
                    }
                }
            } else {
                decision = Decision::direct_reply();
            }
        }

        self.conversation_store
            .append_exchange(&conversation_id, &request.text, &reply_text);

        RouterResponse {
            status: ResponseStatus::Success,
            request_id: request.request_id,
            provider_used,
            reply_text,
            decision,
            error_code: None,
            error: None,
        }
    }

    /// Step 5: strict mode when `provider` was explicitly requested, else
    /// fallback mode walking `providers.priority` in order.
    async fn run_ai(
        &self,
        request: &RouterRequest,
        prompt: &str,
    ) -> Result<(Option<Provider>, String), RouterResponse> {
        if let Some(provider) = request.provider {
            return self
                .provider_runner
                .run(provider, prompt, &self.providers_config)
                .await
                .map(|text| (Some(provider), text))
                .map_err(|e| {
                    RouterResponse::failure_with_provider(
                        request.request_id.clone(),
                        provider,
                        ErrorCode::ProviderLockedFailed,
                        format!("{provider} failed: {e}"),
                    )
                });
        }

        let mut last_error = None;
        for &provider in &self.providers_config.priority {
            match self.provider_runner.run(provider, prompt, &self.providers_config).await {
                Ok(text) => return Ok((Some(provider), text)),
                Err(e) => {
                    warn!(%provider, error = %e, "provider failed in fallback mode, trying next");
                    last_error = Some(format!("{provider} failed: {e}"));
                }
            }
        }

        Err(RouterResponse::failure(
            request.request_id.clone(),
            ErrorCode::AllProvidersFailed,
            last_error.unwrap_or_else(|| "no providers configured".to_string()),
        ))
    }

    /// Step 3: `mode == async_only` short-circuit. No AI call is made.
    async fn handle_async_only(&self, request: &RouterRequest, conversation_id: &str) -> RouterResponse {
        if !self.async_tasks_enabled {
            return RouterResponse::failure(
                request.request_id.clone(),
                ErrorCode::AsyncTasksDisabled,
                "the async-tasks feature is not enabled",
            );
        }

        let title: String = request.text.chars().take(TITLE_CHARS).collect();
        match self.task_creator.create(&title, &request.text).await {
            Ok(task_id) => {
                self.conversation_store.append_exchange(conversation_id, &request.text, "");
                RouterResponse {
                    status: ResponseStatus::Success,
                    request_id: request.request_id.clone(),
                    provider_used: None,
                    reply_text: String::new(),
                    decision: Decision {
                        kind: DecisionKind::AsyncDraftCreated,
                        task_id: Some(task_id),
                        priority_suggested: Some("normal".to_string()),
                    },
                    error_code: None,
                    error: None,
                }
            }
            Err(e) => RouterResponse::failure(
                request.request_id.clone(),
                ErrorCode::AsyncDraftFailed,
                e.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_rejects_invalid_json() {
        let err = Router::parse_request("not json").unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::InvalidJson));
    }

    #[test]
    fn parse_request_rejects_non_object_payload() {
        let err = Router::parse_request("[1,2,3]").unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::MissingInput));
    }

    #[test]
    fn parse_request_rejects_missing_text() {
        let err = Router::parse_request(r#"{"request_id":"r1"}"#).unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::MissingText));
        assert_eq!(err.request_id, "r1");
    }

    #[test]
    fn parse_request_rejects_blank_text() {
        let err = Router::parse_request(r#"{"text":"   "}"#).unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::MissingText));
    }

    #[test]
    fn parse_request_rejects_invalid_mode() {
        let err = Router::parse_request(r#"{"text":"hi","mode":"yolo"}"#).unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::InvalidMode));
    }

    #[test]
    fn parse_request_rejects_unsupported_provider() {
        let err = Router::parse_request(r#"{"text":"hi","provider":"gpt5"}"#).unwrap_err();
        assert_eq!(err.error_code, Some(ErrorCode::UnsupportedProvider));
    }

    #[test]
    fn parse_request_normalizes_unknown_channel_to_other() {
        let req = Router::parse_request(r#"{"text":"hi","channel":"whatsapp"}"#).unwrap();
        assert_eq!(req.channel, Channel::Other);
    }

    #[test]
    fn parse_request_accepts_minimal_valid_payload() {
        let req = Router::parse_request(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(req.text, "hello");
        assert_eq!(req.mode, Mode::Auto);
        assert!(req.provider.is_none());
    }

    #[tokio::test]
    async fn async_only_fails_when_feature_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = router_core::Config::default();
        let router = Router::new(&config, dir.path().to_path_buf(), dir.path().to_path_buf());

        let request = Router::parse_request(r#"{"text":"remember to water plants","mode":"async_only"}"#).unwrap();
        let response = router.handle(request).await;

        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.error_code, Some(ErrorCode::AsyncTasksDisabled));
    }

    #[tokio::test]
    async fn async_only_creates_task_when_feature_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = router_core::Config::default();
        config.features.async_tasks = true;
        // `printf` always exists and prints a task id line we can extract.
        config.router.task_creator_cmd = "printf".to_string();

        let router = Router::new(&config, dir.path().to_path_buf(), dir.path().to_path_buf());
        let request = Router::parse_request(r#"{"text":"task_id: T1\n","mode":"async_only"}"#).unwrap();
        let response = router.handle(request).await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.decision.kind, DecisionKind::AsyncDraftCreated);
        assert_eq!(response.provider_used, None);
    }

    #[tokio::test]
    async fn direct_only_mode_with_all_providers_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = router_core::Config::default();
        config.providers.codex.cmd = Some("definitely-not-a-real-binary-xyz".to_string());
        config.providers.claude.cmd = Some("definitely-not-a-real-binary-xyz".to_string());
        config.providers.gemini.cmd = Some("definitely-not-a-real-binary-xyz".to_string());

        let router = Router::new(&config, dir.path().to_path_buf(), dir.path().to_path_buf());
        let request = Router::parse_request(r#"{"text":"hi","mode":"direct_only"}"#).unwrap();
        let response = router.handle(request).await;

        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.error_code, Some(ErrorCode::AllProvidersFailed));
    }

    #[tokio::test]
    async fn direct_only_mode_succeeds_with_echo_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = router_core::Config::default();
        config.providers.codex.cmd = Some("echo".to_string());

        let router = Router::new(&config, dir.path().to_path_buf(), dir.path().to_path_buf());
        let request = Router::parse_request(r#"{"text":"hi there","mode":"direct_only","provider":"codex"}"#).unwrap();
        let response = router.handle(request).await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.decision.kind, DecisionKind::DirectReply);
        assert_eq!(response.provider_used, Some(Provider::Codex));
        assert!(!response.reply_text.is_empty());
    }

    #[tokio::test]
    async fn strict_mode_provider_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = router_core::Config::default();
        config.providers.claude.cmd = Some("false".to_string());
        config.providers.codex.cmd = Some("echo".to_string());

        let router = Router::new(&config, dir.path().to_path_buf(), dir.path().to_path_buf());
        let request = Router::parse_request(r#"{"text":"hi","mode":"direct_only","provider":"claude"}"#).unwrap();
        let response = router.handle(request).await;

        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.error_code, Some(ErrorCode::ProviderLockedFailed));
        assert_eq!(response.provider_used, Some(Provider::Claude));
    }
}
