//! Config loader — reads `~/.solar-router/config.json`, merges env var
//! overrides (new-style, falling back to legacy names), in the manner of
//! `oxibot-core::config::loader::load_config` / `apply_env_overrides`.
//!
//! # Loading precedence
//! 1. Defaults (`Config::default()`)
//! 2. JSON file at `~/.solar-router/config.json`
//! 3. Environment variables (new-style `SOLAR_ROUTER_*`, falling back to
//!    legacy `SOLAR_*` / `SOLAR_AI_*` names where the spec defines a pair)

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::Config;
use crate::types::Provider;

/// Default config file path: `~/.solar-router/config.json`.
pub fn get_config_path() -> PathBuf {
    default_runtime_dir().join("config.json")
}

/// `~/.solar-router` — also the default runtime/conversation root.
pub fn default_runtime_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".solar-router")
}

/// Loads configuration from the default path plus env var overrides.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!(path = %path.display(), "no config file found, using defaults");
        return apply_env_overrides(Config::default());
    }

    debug!(path = %path.display(), "loading config");
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file");
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to parse config JSON, using defaults");
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Reads `new_name`, falling back to `legacy_name` if unset.
fn env_or_legacy(new_name: &str, legacy_name: &str) -> Option<String> {
    std::env::var(new_name)
        .ok()
        .or_else(|| std::env::var(legacy_name).ok())
}

fn apply_env_overrides(mut config: Config) -> Config {
    if let Some(val) = env_or_legacy("SOLAR_ROUTER_CODEX_CMD", "SOLAR_AI_CODEX_CMD") {
        config.providers.codex.cmd = Some(val);
    }
    if let Some(val) = env_or_legacy("SOLAR_ROUTER_CLAUDE_CMD", "SOLAR_AI_CLAUDE_CMD") {
        config.providers.claude.cmd = Some(val);
    }
    if let Some(val) = env_or_legacy("SOLAR_ROUTER_GEMINI_CMD", "SOLAR_AI_GEMINI_CMD") {
        config.providers.gemini.cmd = Some(val);
    }

    if let Some(val) = env_or_legacy(
        "SOLAR_ROUTER_PROVIDER_PRIORITY",
        "SOLAR_AI_PROVIDER_PRIORITY",
    ) {
        let parsed: Vec<Provider> = val
            .split(',')
            .filter_map(|s| Provider::from_str_loose(s.trim()))
            .collect();
        if !parsed.is_empty() {
            config.providers.priority = parsed;
        }
    }

    if let Some(val) = env_or_legacy("SOLAR_ROUTER_CONTEXT_TURNS", "SOLAR_CONTEXT_TURNS") {
        if let Ok(n) = val.parse::<u32>() {
            config.router.context_turns = n;
        }
    }

    if let Ok(val) = std::env::var("SOLAR_ROUTER_RUNTIME_DIR") {
        config.router.runtime_dir = Some(val);
    }
    if let Ok(val) = std::env::var("SOLAR_ROUTER_SYSTEM_PROMPT_FILE") {
        config.router.system_prompt_file = Some(val);
    }
    if let Some(val) = env_or_legacy(
        "SOLAR_ROUTER_TASK_CREATOR_CMD",
        "SOLAR_TASK_CREATOR_CMD",
    ) {
        config.router.task_creator_cmd = val;
    }

    if let Ok(val) = std::env::var("SOLAR_ROUTER_PROVIDER_TIMEOUT_SEC") {
        if let Ok(n) = val.parse::<u64>() {
            config.providers.timeout_sec = n;
        }
    }
    if let Ok(val) = std::env::var("SOLAR_ROUTER_TIMEOUT_SEC") {
        if let Ok(n) = val.parse::<u64>() {
            config.router.timeout_sec = n;
        }
    }

    if let Ok(val) = std::env::var("SOLAR_SYSTEM_FEATURES") {
        config.features.async_tasks = val.split(',').any(|f| f.trim() == "async-tasks");
    }

    if let Ok(val) = std::env::var("SOLAR_TELEGRAM_DEDUP_TTL_SECONDS") {
        if let Ok(n) = val.parse::<u64>() {
            config.telegram.dedup_ttl_seconds = n;
        }
    }
    if let Ok(val) = std::env::var("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = val;
    }
    if let Ok(val) = std::env::var("TELEGRAM_PARSE_MODE") {
        config.telegram.parse_mode = val;
    }
    if let Ok(val) = std::env::var("TELEGRAM_DISABLE_PREVIEW") {
        config.telegram.disable_preview = val == "true" || val == "1";
    }

    if let Ok(val) = std::env::var("SOLAR_HTTP_HOST") {
        config.http.host = val;
    }
    if let Ok(val) = std::env::var("SOLAR_HTTP_PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.http.port = p;
        }
    }
    if let Ok(val) = std::env::var("SOLAR_HTTP_WEBHOOK_BASE") {
        config.http.webhook_base = val.trim_end_matches('/').to_string();
    }

    if let Ok(val) = std::env::var("SOLAR_WS_HOST") {
        config.ws.host = val;
    }
    if let Ok(val) = std::env::var("SOLAR_WS_PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.ws.port = p;
        }
    }
    if let Ok(val) = std::env::var("SOLAR_WS_PATH") {
        config.ws.path = val;
    }

    config
}

/// Resolves the effective runtime root: config override, else `~/.solar-router`.
pub fn resolve_runtime_dir(config: &Config) -> PathBuf {
    match &config.router.runtime_dir {
        Some(dir) => PathBuf::from(shellexpand_home(dir)),
        None => default_runtime_dir(),
    }
}

fn shellexpand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Env var mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.router.context_turns, 12);
    }

    #[test]
    fn load_invalid_json_returns_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.providers.timeout_sec, 300);
    }

    #[test]
    fn new_env_var_wins_over_legacy() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOLAR_ROUTER_CODEX_CMD", "new-cmd");
        std::env::set_var("SOLAR_AI_CODEX_CMD", "legacy-cmd");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.codex.cmd.as_deref(), Some("new-cmd"));
        std::env::remove_var("SOLAR_ROUTER_CODEX_CMD");
        std::env::remove_var("SOLAR_AI_CODEX_CMD");
    }

    #[test]
    fn legacy_env_var_used_when_new_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SOLAR_ROUTER_CONTEXT_TURNS");
        std::env::set_var("SOLAR_CONTEXT_TURNS", "20");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.router.context_turns, 20);
        std::env::remove_var("SOLAR_CONTEXT_TURNS");
    }

    #[test]
    fn features_flag_parses_comma_separated_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOLAR_SYSTEM_FEATURES", "foo, async-tasks ,bar");
        let config = apply_env_overrides(Config::default());
        assert!(config.features.async_tasks);
        std::env::remove_var("SOLAR_SYSTEM_FEATURES");
    }

    #[test]
    fn provider_priority_overrides_order() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SOLAR_ROUTER_PROVIDER_PRIORITY", "gemini,codex");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.priority, vec![Provider::Gemini, Provider::Codex]);
        std::env::remove_var("SOLAR_ROUTER_PROVIDER_PRIORITY");
    }
}
