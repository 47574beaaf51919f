//! Config schema — `~/.solar-router/config.json`.
//!
//! Follows the teacher's nesting and `camelCase`-on-disk convention
//! (`oxibot-core::config::schema`): every section is its own struct with
//! `#[serde(rename_all = "camelCase", default)]` and `default_xxx()` helpers,
//! so a partial or missing config file still produces a complete `Config`.

use serde::{Deserialize, Serialize};

use crate::types::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub router: RouterConfig,
    pub providers: ProvidersConfig,
    pub features: FeaturesConfig,
    pub telegram: TelegramConfig,
    pub http: HttpConfig,
    pub ws: WsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            providers: ProvidersConfig::default(),
            features: FeaturesConfig::default(),
            telegram: TelegramConfig::default(),
            http: HttpConfig::default(),
            ws: WsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Base directory for conversation files and other runtime state.
    /// Defaults to `~/.solar-router` when unset.
    pub runtime_dir: Option<String>,
    /// Path to the system prompt file; built-in default text used if unset
    /// or unreadable.
    pub system_prompt_file: Option<String>,
    /// Last-N window size: prompts carry at most `2 * context_turns` prior
    /// records.
    pub context_turns: u32,
    /// Router-level subprocess timeout (creator + provider invocations the
    /// Router directly awaits), in seconds.
    pub timeout_sec: u64,
    /// Invocation for the external deferred-task creator (see §4.5); the
    /// title and description are appended as the final two arguments.
    pub task_creator_cmd: String,
}

fn default_context_turns() -> u32 {
    12
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            system_prompt_file: None,
            context_turns: default_context_turns(),
            timeout_sec: 310,
            task_creator_cmd: "solar-async-tasks-create".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub codex: ProviderCmdConfig,
    pub claude: ProviderCmdConfig,
    pub gemini: ProviderCmdConfig,
    /// Fallback-mode priority order. Default `[codex, claude, gemini]`.
    pub priority: Vec<Provider>,
    /// Per-invocation subprocess timeout, in seconds.
    pub timeout_sec: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            codex: ProviderCmdConfig::default(),
            claude: ProviderCmdConfig::default(),
            gemini: ProviderCmdConfig::default(),
            priority: vec![Provider::Codex, Provider::Claude, Provider::Gemini],
            timeout_sec: 300,
        }
    }
}

impl ProvidersConfig {
    pub fn cmd_override(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Codex => self.codex.cmd.as_deref(),
            Provider::Claude => self.claude.cmd.as_deref(),
            Provider::Gemini => self.gemini.cmd.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderCmdConfig {
    /// Overrides the built-in default invocation string for this provider.
    pub cmd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeaturesConfig {
    /// Enables §4.5/§4.6 deferred task materialization.
    pub async_tasks: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { async_tasks: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub parse_mode: String,
    pub disable_preview: bool,
    pub dedup_ttl_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            parse_mode: "Markdown".to_string(),
            disable_preview: true,
            dedup_ttl_seconds: 43_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub webhook_base: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            webhook_base: "/webhook".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            path: "/ws".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.router.context_turns, 12);
        assert_eq!(config.providers.timeout_sec, 300);
        assert_eq!(config.telegram.dedup_ttl_seconds, 43_200);
        assert_eq!(config.http.port, 8787);
        assert_eq!(config.ws.port, 8765);
        assert_eq!(
            config.providers.priority,
            vec![Provider::Codex, Provider::Claude, Provider::Gemini]
        );
    }

    #[test]
    fn deserializes_camel_case_partial_json() {
        let config: Config = serde_json::from_str(
            r#"{"telegram": {"botToken": "abc", "dedupTtlSeconds": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "abc");
        assert_eq!(config.telegram.dedup_ttl_seconds, 10);
        // Untouched sections keep their defaults.
        assert_eq!(config.http.port, 8787);
    }
}
