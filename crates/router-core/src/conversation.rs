//! Conversation Store — append-only per-conversation JSONL log.
//!
//! File layout: `<runtime_root>/conversations/<sanitized_id>.jsonl`, one
//! `{"role": "...", "text": "..."}` record per line, ASCII-escaped. Ported
//! from `run_router.py`'s `conversation_file` / `load_recent_messages` /
//! `append_message`, restructured as a small store type in the manner of
//! `oxibot-core::session::SessionManager` (synchronous `std::fs`, a lock
//! guarding concurrent writers, tolerant line-by-line parsing).

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::idutil::{escape_ascii, sanitize_id};
use crate::types::{ConversationRecord, Role};

/// Appends and loads conversation turns from disk.
///
/// Concurrent appends across conversations are serialized by a single
/// mutex, matching the "process-level exclusion" the spec calls for — the
/// store has no per-conversation locking because only the Router process
/// ever writes these files.
pub struct ConversationStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl ConversationStore {
    /// `root` is the runtime root; conversation files live under
    /// `root/conversations/`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn conversation_path(&self, conversation_id: &str) -> PathBuf {
        self.root
            .join("conversations")
            .join(format!("{}.jsonl", sanitize_id(conversation_id)))
    }

    /// Loads the most recent `2 * max_context_turns` valid records, in
    /// file order (oldest to newest). Tolerates malformed or empty lines by
    /// skipping them; a missing file yields an empty history.
    pub fn load_recent(&self, conversation_id: &str, max_context_turns: usize) -> Vec<ConversationRecord> {
        let path = self.conversation_path(conversation_id);
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => continue,
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConversationRecord>(&line) {
                Ok(record) if !record.text.is_empty() => records.push(record),
                Ok(_) => continue,
                Err(_) => {
                    debug!(path = %path.display(), "skipping malformed conversation record");
                    continue;
                }
            }
        }

        let window = 2 * max_context_turns;
        if records.len() > window {
            let start = records.len() - window;
            records.split_off(start)
        } else {
            records
        }
    }

    /// Appends a single record with a trailing newline. Best-effort: write
    /// failures are logged, not propagated, matching the spec's "writes are
    /// best-effort; no fsync is required".
    pub fn append(&self, conversation_id: &str, role: Role, text: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.conversation_path(conversation_id);
        if let Err(e) = self.append_inner(&path, role, text) {
            warn!(path = %path.display(), error = %e, "failed to append conversation record");
        }
    }

    fn append_inner(&self, path: &Path, role: Role, text: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = ConversationRecord {
            role,
            text: text.to_string(),
        };
        let line = serialize_ascii_safe(&record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Appends the user turn then the assistant turn, in that order — the
    /// only write path the Router is allowed to take on a successful
    /// exchange (spec invariant: exactly two records, user first).
    pub fn append_exchange(&self, conversation_id: &str, user_text: &str, assistant_text: &str) {
        self.append(conversation_id, Role::User, user_text);
        self.append(conversation_id, Role::Assistant, assistant_text);
    }
}

/// Serializes a `ConversationRecord` the way `json.dumps(ensure_ascii=True)`
/// would: serialize normally first (correct quoting/backslash escaping for
/// ASCII), then escape non-ASCII scalars in the resulting JSON text —
/// escaping before serializing would double-escape the backslashes
/// `escape_ascii` itself introduces.
fn serialize_ascii_safe(record: &ConversationRecord) -> serde_json::Result<String> {
    let json = serde_json::to_string(record)?;
    Ok(escape_ascii(&json))
}
