//! `router exec-task` — the Task Executor (§4.9). Grounded on
//! `execute_active.py`: invokes the router command as a subprocess with a
//! fixed-shape prompt, always attempts to JSON-decode stdout first (the
//! router emits structured failures even on a nonzero exit), writes an
//! execution log, and on failure rewrites the task's frontmatter and moves
//! the file to a sibling `error/` directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use router_core::error::ErrorCode;
use router_core::types::RouterResponse;
use router_providers::cmdline::{resolve_executable, split_command};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::setup;

fn status_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^status:\s*.*$").unwrap())
}

struct TaskFile {
    frontmatter: Vec<(String, String)>,
    body: String,
}

fn parse_task_file(content: &str) -> TaskFile {
    let mut lines = content.lines();
    if lines.next() != Some("---") {
        return TaskFile {
            frontmatter: Vec::new(),
            body: content.to_string(),
        };
    }

    let mut frontmatter = Vec::new();
    let mut body_lines = Vec::new();
    let mut in_frontmatter = true;
    for line in lines {
        if in_frontmatter {
            if line.trim() == "---" {
                in_frontmatter = false;
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                frontmatter.push((key.trim().to_string(), value.trim().to_string()));
            }
        } else {
            body_lines.push(line);
        }
    }

    TaskFile {
        frontmatter,
        body: body_lines.join("\n").trim().to_string(),
    }
}

fn frontmatter_value<'a>(frontmatter: &'a [(String, String)], key: &str) -> Option<&'a str> {
    frontmatter.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub async fn run(
    task_file: PathBuf,
    router_command: String,
    task_id: String,
    title: String,
) -> anyhow::Result<i32> {
    let config = setup::load_config();

    let content = std::fs::read_to_string(&task_file)
        .with_context(|| format!("failed to read task file: {}", task_file.display()))?;
    let task = parse_task_file(&content);
    let provider = frontmatter_value(&task.frontmatter, "provider").map(str::to_string);

    let prompt = format!("Task ID: {task_id}\nTitle: {title}\n\n{}", task.body);

    let mut payload = json!({
        "request_id": format!("task_{task_id}"),
        "session_id": format!("async-task:{task_id}"),
        "text": prompt,
        "channel": "async-task",
        "mode": "direct_only",
    });
    if let Some(p) = &provider {
        payload["provider"] = json!(p);
    }

    let timeout = Duration::from_secs(config.router.timeout_sec);
    let response = invoke_router(&router_command, &payload.to_string(), timeout).await;

    let success = response.is_success() && !response.reply_text.is_empty();

    write_execution_log(&task_file, &task_id, &title, &response)
        .context("failed to write execution log")?;

    if success {
        Ok(0)
    } else {
        handle_failure(&task_file, &content, &task_id, provider.as_deref(), &response)
            .context("failed to record task failure")?;
        Ok(1)
    }
}

/// Spawns `router_command`, writes `payload` to its stdin, and always
/// attempts to parse its stdout as a `RouterResponse` first — a nonzero
/// exit code does not short-circuit this (§4.9 parsing policy).
async fn invoke_router(router_command: &str, payload: &str, timeout: Duration) -> RouterResponse {
    let mut argv = split_command(router_command);
    if argv.is_empty() {
        return RouterResponse::failure("", ErrorCode::RouterCrashed, "empty router command");
    }
    let program = argv.remove(0);
    let resolved = match resolve_executable(&program) {
        Some(p) => p,
        None => {
            return RouterResponse::failure(
                "",
                ErrorCode::RouterCrashed,
                format!("router executable not found: {program}"),
            )
        }
    };

    let mut child = match Command::new(&resolved)
        .args(&argv)
        .kill_on_drop(true)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return RouterResponse::failure("", ErrorCode::RouterCrashed, format!("spawn failed: {e}")),
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return RouterResponse::failure("", ErrorCode::RouterCrashed, format!("I/O error: {e}")),
        Err(_) => return RouterResponse::failure("", ErrorCode::RouterTimeout, "router exceeded its timeout"),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str::<RouterResponse>(stdout.trim()) {
        Ok(response) => response,
        Err(_) => RouterResponse::failure(
            "",
            ErrorCode::RouterCrashed,
            format!(
                "router produced no parseable JSON (exit {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ),
    }
}

fn write_execution_log(
    task_file: &Path,
    task_id: &str,
    title: &str,
    response: &RouterResponse,
) -> anyhow::Result<()> {
    let task_root = task_file
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let log_dir = task_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let success = response.is_success() && !response.reply_text.is_empty();
    let outcome = if success { "success" } else { "failure" };
    let provider_used = response
        .provider_used
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());

    let mut log = format!(
        "outcome: {outcome}\ntask_id: {task_id}\ntitle: {title}\nexecuted_at: {}\nprovider_used: {provider_used}\n\n",
        now_rfc3339()
    );

    if success {
        log.push_str("## Result\n\n");
        log.push_str(&response.reply_text);
        log.push('\n');
    } else {
        log.push_str("## Error\n\n");
        log.push_str(&format!(
            "error_code: {}\nerror: {}\n",
            response.error_code.map(|c| c.as_str()).unwrap_or("decision_engine_failed"),
            response.error.as_deref().unwrap_or("unknown error")
        ));
    }

    std::fs::write(log_dir.join(format!("{task_id}.md")), log)?;
    Ok(())
}

fn handle_failure(
    task_file: &Path,
    original_content: &str,
    task_id: &str,
    provider_attempted: Option<&str>,
    response: &RouterResponse,
) -> anyhow::Result<()> {
    let rewritten = if status_line_re().is_match(original_content) {
        status_line_re().replace(original_content, "status: error").to_string()
    } else {
        original_content.to_string()
    };

    let error_block = format!(
        "\n\n## Execution Error\n- time: {}\n- provider_attempted: {}\n- error_code: {}\n- error: {}\n",
        now_rfc3339(),
        provider_attempted.unwrap_or("none"),
        response.error_code.map(|c| c.as_str()).unwrap_or("decision_engine_failed"),
        response.error.as_deref().unwrap_or("unknown error"),
    );

    let updated = format!("{rewritten}{error_block}");
    std::fs::write(task_file, updated)?;

    let task_root = task_file
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let error_dir = task_root.join("error");
    std::fs::create_dir_all(&error_dir)?;
    let destination = error_dir.join(
        task_file
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| format!("{task_id}.md").into()),
    );
    std::fs::rename(task_file, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_and_strips_it_from_body() {
        let content = "---\nstatus: active\nprovider: gemini\n---\nDo the thing.";
        let task = parse_task_file(content);
        assert_eq!(frontmatter_value(&task.frontmatter, "status"), Some("active"));
        assert_eq!(frontmatter_value(&task.frontmatter, "provider"), Some("gemini"));
        assert_eq!(task.body, "Do the thing.");
    }

    #[test]
    fn missing_frontmatter_treats_whole_file_as_body() {
        let task = parse_task_file("just a body, no frontmatter");
        assert!(task.frontmatter.is_empty());
        assert_eq!(task.body, "just a body, no frontmatter");
    }

    #[test]
    fn status_line_rewrite_replaces_in_place() {
        let content = "---\nstatus: active\n---\nbody";
        let rewritten = status_line_re().replace(content, "status: error").to_string();
        assert!(rewritten.contains("status: error"));
        assert!(!rewritten.contains("status: active"));
    }

    #[tokio::test]
    async fn invoke_router_reports_crashed_when_binary_missing() {
        let response = invoke_router("definitely-not-a-real-binary-xyz", "{}", Duration::from_secs(5)).await;
        assert_eq!(response.error_code, Some(ErrorCode::RouterCrashed));
    }

    #[tokio::test]
    async fn invoke_router_parses_json_even_on_nonzero_exit() {
        // `false` exits 1 and prints nothing; the fallback crashed envelope applies.
        let response = invoke_router("false", "{}", Duration::from_secs(5)).await;
        assert_eq!(response.error_code, Some(ErrorCode::RouterCrashed));
    }
}
