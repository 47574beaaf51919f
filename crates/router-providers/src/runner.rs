//! Provider Runner — executes one named AI provider CLI as a subprocess.
//!
//! Ported from `run_router.py`: `run_provider()` / `get_cmd()` /
//! `DEFAULT_CMDS`. Subprocess plumbing (spawn, pipe stdout/stderr, timeout)
//! mirrors `oxibot-agent::tools::shell::ExecTool`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use router_core::config::ProvidersConfig;
use router_core::types::Provider;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cmdline::{resolve_executable, split_command};

/// Built-in default invocation for each provider: headless, non-interactive,
/// permission-bypassing as appropriate. `{repo_root}` / `{codex_state_dir}`
/// are substituted before splitting.
fn default_cmd(provider: Provider) -> &'static str {
    match provider {
        Provider::Codex => {
            "codex exec --skip-git-repo-check --full-auto -C {repo_root} --add-dir {codex_state_dir} --"
        }
        Provider::Claude => "claude -p --permission-mode bypassPermissions --no-session-persistence",
        Provider::Gemini => "gemini -y -p",
    }
}

const OAUTH_SENTINELS: &[&str] = &[
    "Please visit the following URL to authorize the application",
    "Enter the authorization code:",
];

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap())
}

fn strip_ansi(s: &str) -> String {
    ansi_re().replace_all(s, "").to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    #[error("executable_not_found: {0}")]
    ExecutableNotFound(String),
    #[error("nonzero_exit: exit code {code}: {excerpt}")]
    NonzeroExit { code: i32, excerpt: String },
    #[error("empty_output")]
    EmptyOutput,
    #[error("oauth_prompt_detected")]
    OauthPromptDetected,
    #[error("timeout")]
    Timeout,
}

impl ProviderFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ProviderFailure::ExecutableNotFound(_) => "executable_not_found",
            ProviderFailure::NonzeroExit { .. } => "nonzero_exit",
            ProviderFailure::EmptyOutput => "empty_output",
            ProviderFailure::OauthPromptDetected => "oauth_prompt_detected",
            ProviderFailure::Timeout => "timeout",
        }
    }
}

pub struct ProviderRunner {
    repo_root: PathBuf,
}

impl ProviderRunner {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    /// Runs `provider` with `prompt` as the final positional argument.
    pub async fn run(
        &self,
        provider: Provider,
        prompt: &str,
        providers_config: &ProvidersConfig,
    ) -> Result<String, ProviderFailure> {
        let timeout = Duration::from_secs(providers_config.timeout_sec);
        let cmd_str = self.resolve_cmd_string(provider, providers_config);
        let mut argv = split_command(&cmd_str);
        if argv.is_empty() {
            return Err(ProviderFailure::ExecutableNotFound(cmd_str));
        }
        let program = argv.remove(0);

        let resolved = resolve_executable(&program)
            .ok_or_else(|| ProviderFailure::ExecutableNotFound(program.clone()))?;

        argv.push(prompt.to_string());

        debug!(provider = %provider, program = %resolved.display(), "spawning provider subprocess");

        let mut command = Command::new(&resolved);
        command
            .args(&argv)
            .current_dir(&self.repo_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        if provider == Provider::Gemini {
            if std::env::var_os("GEMINI_CLI_HOME").is_none() {
                if let Some(home) = dirs_next::home_dir() {
                    command.env("GEMINI_CLI_HOME", home);
                }
            }
            if std::env::var_os("GEMINI_FORCE_ENCRYPTED_FILE_STORAGE").is_none() {
                command.env("GEMINI_FORCE_ENCRYPTED_FILE_STORAGE", "false");
            }
        }

        let child = command
            .spawn()
            .map_err(|e| ProviderFailure::ExecutableNotFound(format!("{program}: {e}")))?;

        let result = tokio::time::timeout(timeout, child.wait_with_output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(provider = %provider, error = %e, "provider subprocess I/O error");
                return Err(ProviderFailure::ExecutableNotFound(e.to_string()));
            }
            Err(_) => return Err(ProviderFailure::Timeout),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let excerpt = if !stderr.trim().is_empty() {
                stderr.trim().to_string()
            } else {
                stdout.trim().to_string()
            };
            return Err(ProviderFailure::NonzeroExit {
                code: output.status.code().unwrap_or(-1),
                excerpt,
            });
        }

        let cleaned = if provider == Provider::Gemini {
            strip_ansi(&stdout)
        } else {
            stdout
        };

        if provider == Provider::Gemini
            && OAUTH_SENTINELS.iter().any(|s| cleaned.contains(s))
        {
            return Err(ProviderFailure::OauthPromptDetected);
        }

        let trimmed = cleaned.trim().to_string();
        if trimmed.is_empty() {
            return Err(ProviderFailure::EmptyOutput);
        }

        Ok(trimmed)
    }

    fn resolve_cmd_string(&self, provider: Provider, providers_config: &ProvidersConfig) -> String {
        if let Some(cmd) = providers_config.cmd_override(provider) {
            return cmd.to_string();
        }
        let template = default_cmd(provider);
        let codex_state_dir = dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codex");
        template
            .replace("{repo_root}", &path_str(&self.repo_root))
            .replace("{codex_state_dir}", &path_str(&codex_state_dir))
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_core::config::ProvidersConfig;

    #[tokio::test]
    async fn run_fails_with_executable_not_found() {
        let runner = ProviderRunner::new(PathBuf::from("/tmp"));
        let mut cfg = ProvidersConfig::default();
        cfg.codex.cmd = Some("definitely-not-a-real-binary-xyz".to_string());
        let result = runner.run(Provider::Codex, "hi", &cfg).await;
        assert!(matches!(result, Err(ProviderFailure::ExecutableNotFound(_))));
    }

    #[tokio::test]
    async fn run_fails_on_nonzero_exit() {
        let runner = ProviderRunner::new(PathBuf::from("/tmp"));
        let mut cfg = ProvidersConfig::default();
        cfg.codex.cmd = Some("sh -c exit\\ 7".to_string());
        let result = runner.run(Provider::Codex, "hi", &cfg).await;
        match result {
            Err(ProviderFailure::NonzeroExit { code, .. }) => assert_eq!(code, 7),
            other => panic!("expected NonzeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_fails_on_empty_output() {
        let runner = ProviderRunner::new(PathBuf::from("/tmp"));
        let mut cfg = ProvidersConfig::default();
        cfg.codex.cmd = Some("true".to_string());
        let result = runner.run(Provider::Codex, "hi", &cfg).await;
        assert!(matches!(result, Err(ProviderFailure::EmptyOutput)));
    }

    #[tokio::test]
    async fn run_succeeds_and_trims_output() {
        let runner = ProviderRunner::new(PathBuf::from("/tmp"));
        let mut cfg = ProvidersConfig::default();
        cfg.codex.cmd = Some("echo".to_string());
        let result = runner.run(Provider::Codex, "hello", &cfg).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn run_times_out() {
        let runner = ProviderRunner::new(PathBuf::from("/tmp"));
        let mut cfg = ProvidersConfig::default();
        cfg.codex.cmd = Some("sleep 30".to_string());
        cfg.timeout_sec = 1;
        let result = runner.run(Provider::Codex, "hi", &cfg).await;
        assert!(matches!(result, Err(ProviderFailure::Timeout)));
    }

    #[test]
    fn strip_ansi_removes_csi_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn default_cmd_substitution_includes_repo_root() {
        let runner = ProviderRunner::new(PathBuf::from("/srv/repo"));
        let cfg = ProvidersConfig::default();
        let cmd = runner.resolve_cmd_string(Provider::Codex, &cfg);
        assert!(cmd.contains("/srv/repo"));
        assert!(cmd.contains(".codex"));
    }
}
