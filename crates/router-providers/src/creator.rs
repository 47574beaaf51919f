//! Deferred Task Creator — invokes the external task-creator subprocess and
//! extracts the identifier it prints.
//!
//! Ported from the async-task creation half of the legacy router scripts;
//! subprocess plumbing mirrors `ProviderRunner::run` /
//! `oxibot-agent::tools::shell::ExecTool`.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

use crate::cmdline::{resolve_executable, split_command};

const CREATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum CreatorFailure {
    #[error("executable_not_found: {0}")]
    ExecutableNotFound(String),
    #[error("creator exited with code {code}: {excerpt}")]
    NonzeroExit { code: i32, excerpt: String },
    #[error("creator produced no usable task id")]
    NoTaskId,
    #[error("timeout")]
    Timeout,
}

fn task_id_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)task_id\s*:\s*(.+)").unwrap())
}

pub struct DeferredTaskCreator {
    repo_root: PathBuf,
    creator_cmd: String,
}

impl DeferredTaskCreator {
    pub fn new(repo_root: PathBuf, creator_cmd: String) -> Self {
        Self {
            repo_root,
            creator_cmd,
        }
    }

    /// Invokes the external creator with `(title, description)` and
    /// extracts the task identifier from its stdout.
    pub async fn create(&self, title: &str, description: &str) -> Result<String, CreatorFailure> {
        let mut argv = split_command(&self.creator_cmd);
        if argv.is_empty() {
            return Err(CreatorFailure::ExecutableNotFound(self.creator_cmd.clone()));
        }
        let program = argv.remove(0);
        let resolved = resolve_executable(&program)
            .ok_or_else(|| CreatorFailure::ExecutableNotFound(program.clone()))?;

        argv.push(title.to_string());
        argv.push(description.to_string());

        debug!(program = %resolved.display(), "spawning task creator subprocess");

        let child = Command::new(&resolved)
            .args(&argv)
            .current_dir(&self.repo_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| CreatorFailure::ExecutableNotFound(format!("{program}: {e}")))?;

        let result = tokio::time::timeout(CREATOR_TIMEOUT, child.wait_with_output()).await;
        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CreatorFailure::ExecutableNotFound(e.to_string())),
            Err(_) => return Err(CreatorFailure::Timeout),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let excerpt = if !stderr.trim().is_empty() {
                stderr.trim().to_string()
            } else {
                stdout.trim().to_string()
            };
            return Err(CreatorFailure::NonzeroExit {
                code: output.status.code().unwrap_or(-1),
                excerpt,
            });
        }

        extract_task_id(&stdout).ok_or(CreatorFailure::NoTaskId)
    }
}

/// Extracts a task id: prefers an explicit `task_id: <value>` line
/// (case-insensitive), otherwise falls back to the last non-empty line.
/// This is a heuristic — callers should prefer the explicit line form.
fn extract_task_id(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        if let Some(caps) = task_id_line_re().captures(line) {
            let value = caps.get(1)?.as_str().trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    stdout
        .lines()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_explicit_task_id_line() {
        let stdout = "Creating task...\ntask_id: T42\ndone";
        assert_eq!(extract_task_id(stdout), Some("T42".to_string()));
    }

    #[test]
    fn extracts_task_id_case_insensitively() {
        let stdout = "TASK_ID: T7";
        assert_eq!(extract_task_id(stdout), Some("T7".to_string()));
    }

    #[test]
    fn falls_back_to_last_non_empty_line() {
        let stdout = "creating...\n\nT99\n\n";
        assert_eq!(extract_task_id(stdout), Some("T99".to_string()));
    }

    #[test]
    fn empty_output_yields_none() {
        assert_eq!(extract_task_id("\n\n   \n"), None);
    }

    #[tokio::test]
    async fn create_fails_when_executable_missing() {
        let creator = DeferredTaskCreator::new(
            PathBuf::from("/tmp"),
            "definitely-not-a-real-binary-xyz".to_string(),
        );
        let result = creator.create("title", "desc").await;
        assert!(matches!(result, Err(CreatorFailure::ExecutableNotFound(_))));
    }

    #[tokio::test]
    async fn create_succeeds_and_extracts_id() {
        // `printf` is a POSIX utility present in any test environment.
        let creator = DeferredTaskCreator::new(PathBuf::from("/tmp"), "printf".to_string());
        let result = creator.create("t: %s\\n", "unused").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn create_fails_on_nonzero_exit() {
        let creator = DeferredTaskCreator::new(PathBuf::from("/tmp"), "false".to_string());
        let result = creator.create("title", "desc").await;
        assert!(matches!(result, Err(CreatorFailure::NonzeroExit { .. })));
    }
}
