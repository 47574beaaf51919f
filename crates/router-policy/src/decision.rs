//! Decision Engine — classifies AI output into a `Decision` (§4.4).
//!
//! The three-attempt structured-output parse (whole string → first balanced
//! `{...}` → degrade to direct reply) is the part of this component most
//! worth getting right: models routinely wrap JSON in prose or code fences.

use router_core::types::{Channel, Decision, DecisionKind, Mode};
use serde_json::Value;
use tracing::debug;

/// The decision plus, when the engine parsed structured JSON in `auto`
/// mode, the `reply_text` field it found — callers use this instead of
/// re-parsing the raw AI output (see Router step 7).
pub struct DecisionOutcome {
    pub decision: Decision,
    pub parsed_reply_text: Option<String>,
}

pub struct DecisionEngine;

impl DecisionEngine {
    /// `raw_output` is the provider's text output; `None` is only meaningful
    /// for modes that never call a provider (the Router passes `None` for
    /// `direct_only`/`async-task` paths where this value is unused).
    pub fn decide(mode: Mode, channel: Channel, raw_output: Option<&str>) -> DecisionOutcome {
        match mode {
            Mode::DirectOnly => DecisionOutcome {
                decision: Decision::direct_reply(),
                parsed_reply_text: None,
            },
            Mode::AsyncOnly => {
                // Defensive fallback: the Router short-circuits async_only
                // before any AI call (§4.6 step 3); reaching here at all is
                // the "AI already ran anyway" edge case.
                DecisionOutcome {
                    decision: Decision {
                        kind: DecisionKind::AsyncDraftCreated,
                        task_id: None,
                        priority_suggested: Some("normal".to_string()),
                    },
                    parsed_reply_text: None,
                }
            }
            Mode::Auto => Self::decide_auto(channel, raw_output),
        }
    }

    fn decide_auto(channel: Channel, raw_output: Option<&str>) -> DecisionOutcome {
        if channel == Channel::AsyncTask {
            return DecisionOutcome {
                decision: Decision::direct_reply(),
                parsed_reply_text: None,
            };
        }

        let output = raw_output.unwrap_or("");
        let parsed = parse_structured_output(output);

        let Some(obj) = parsed else {
            debug!("decision engine: no parseable decision object, degrading to direct_reply");
            return DecisionOutcome {
                decision: Decision::direct_reply(),
                parsed_reply_text: None,
            };
        };

        let kind = obj
            .get("decision")
            .and_then(|d| d.get("kind"))
            .and_then(|k| k.as_str())
            .and_then(DecisionKind::from_str_strict)
            .unwrap_or(DecisionKind::DirectReply);

        let task_id = obj
            .get("decision")
            .and_then(|d| d.get("task_id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let priority_suggested = obj
            .get("decision")
            .and_then(|d| d.get("priority_suggested"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let parsed_reply_text = obj
            .get("reply_text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        DecisionOutcome {
            decision: Decision {
                kind,
                task_id,
                priority_suggested,
            },
            parsed_reply_text,
        }
    }
}

/// Attempt 1 + 2: parse the whole output (after stripping a single fenced
/// code block), then the first balanced `{...}` substring. Attempt 3
/// (degradation) is the caller's fallback when this returns `None` but
/// `output` is non-empty — handled by `decide_auto`.
fn parse_structured_output(output: &str) -> Option<Value> {
    let unfenced = strip_single_fence(output.trim());

    if let Ok(value) = serde_json::from_str::<Value>(unfenced.trim()) {
        if value.get("decision").is_some() {
            return Some(value);
        }
    }

    if let Some(candidate) = find_first_balanced_braces(output) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.get("decision").is_some() {
                return Some(value);
            }
        }
    }

    None
}

/// Strips one leading/trailing ``` fenced block, if present (with or
/// without a language tag on the opening fence).
fn strip_single_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let after_lang = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    after_lang.strip_suffix("```").unwrap_or(after_lang).trim()
}

/// Finds the first top-level balanced `{...}` substring, respecting string
/// literals (so `{` inside a JSON string doesn't confuse the brace count).
fn find_first_balanced_braces(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = s.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
