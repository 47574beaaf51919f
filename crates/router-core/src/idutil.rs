//! Conversation id sanitization and ASCII-safe JSON escaping.
//!
//! Ported from `run_router.py::sanitize_id` — any run of characters outside
//! `[A-Za-z0-9._-]` collapses to a single `_`; the result is capped at 120
//! characters; an empty result becomes `"unknown"`.

use regex::Regex;
use std::sync::OnceLock;

fn unsafe_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap())
}

/// Sanitizes a conversation id for safe use as a filename component.
pub fn sanitize_id(value: &str) -> String {
    let trimmed = value.trim();
    let collapsed = unsafe_run().replace_all(trimmed, "_");
    let capped: String = collapsed.chars().take(120).collect();
    if capped.is_empty() {
        "unknown".to_string()
    } else {
        capped
    }
}

/// Escapes a string the way Python's `json.dumps(..., ensure_ascii=True)`
/// would: every non-ASCII scalar becomes a `\uXXXX` escape (surrogate pairs
/// for codepoints above the BMP), keeping the conversation log grep-safe
/// across locales. `serde_json` has no built-in equivalent.
pub fn escape_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_unsafe_runs() {
        assert_eq!(sanitize_id("telegram:12345"), "telegram_12345");
        assert_eq!(sanitize_id("a///b"), "a_b");
    }

    #[test]
    fn sanitize_empty_becomes_unknown() {
        assert_eq!(sanitize_id(""), "unknown");
        assert_eq!(sanitize_id("   "), "unknown");
        // A run of unsafe characters collapses to a single "_", not "unknown".
        assert_eq!(sanitize_id("***"), "_");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_id(&long).len(), 120);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let id = "telegram:123/../../etc";
        let once = sanitize_id(id);
        let twice = sanitize_id(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn escape_ascii_passes_through_ascii() {
        assert_eq!(escape_ascii("hello world"), "hello world");
    }

    #[test]
    fn escape_ascii_escapes_non_ascii() {
        assert_eq!(escape_ascii("héllo"), "h\\u00e9llo");
    }

    #[test]
    fn escape_ascii_handles_surrogate_pairs() {
        // U+1F600 GRINNING FACE requires a surrogate pair in UTF-16.
        let escaped = escape_ascii("\u{1F600}");
        assert_eq!(escaped, "\\ud83d\\ude00");
    }
}
