//! Prompt Builder — assembles the single text prompt sent to a provider.
//!
//! Layout and trailer wording follow §4.3; the base layout (system prompt /
//! conversation context header / recent turns / current message) is ported
//! from `run_router.py::build_prompt`, extended with the `auto`-mode
//! structured-output trailer that the legacy script never needed.

use router_core::types::{Channel, ConversationRecord, Mode, Role};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that responds concisely and accurately.";

pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new(system_prompt: String) -> Self {
        Self { system_prompt }
    }

    /// Reads the system prompt from `path`, falling back to the built-in
    /// default if the file is missing or unreadable.
    pub fn from_file(path: Option<&str>) -> Self {
        let system_prompt = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self { system_prompt }
    }

    pub fn build(
        &self,
        conversation_id: &str,
        channel: Channel,
        mode: Mode,
        recent_turns: &[ConversationRecord],
        user_text: &str,
    ) -> String {
        let mut sections = vec![
            self.system_prompt.clone(),
            format!(
                "Conversation context\n- conversation_id: {}\n- channel: {}\n- mode: {}",
                conversation_id,
                channel.as_str(),
                mode.as_str()
            ),
        ];

        if !recent_turns.is_empty() {
            let mut block = String::from("Recent turns (oldest -> newest):\n");
            for record in recent_turns {
                let speaker = match record.role {
                    Role::User => "USER",
                    Role::Assistant => "ASSISTANT",
                };
                block.push_str(&format!("{}: {}\n", speaker, record.text));
            }
            sections.push(block.trim_end().to_string());
        }

        sections.push(format!("Current user message:\n{}", user_text));
        sections.push(trailer(mode).to_string());

        sections.join("\n\n")
    }
}

fn trailer(mode: Mode) -> &'static str {
    match mode {
        Mode::Auto => {
            "Respond with a single JSON object as the first block of your output — no markdown \
             code fences, no text before it. It must contain at least:\n\
             {\"decision\": {\"kind\": \"<direct_reply | async_draft_created | async_activation_needed>\"}, \"reply_text\": \"<text>\"}\n\
             Use direct_reply for anything you can answer immediately. Use async_draft_created when \
             the request should become a deferred background task. Use async_activation_needed only \
             when an existing deferred task should be activated."
        }
        Mode::DirectOnly | Mode::AsyncOnly => "Respond directly to the current user message.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_only_uses_direct_reply_trailer() {
        let builder = PromptBuilder::new("sys".to_string());
        let prompt = builder.build("c1", Channel::Other, Mode::DirectOnly, &[], "hi");
        assert!(prompt.ends_with("Respond directly to the current user message."));
    }

    #[test]
    fn auto_mode_forbids_code_fences() {
        let builder = PromptBuilder::new("sys".to_string());
        let prompt = builder.build("c1", Channel::Telegram, Mode::Auto, &[], "hi");
        assert!(prompt.contains("no markdown"));
        assert!(prompt.contains("\"decision\""));
    }

    #[test]
    fn omits_recent_turns_section_when_empty() {
        let builder = PromptBuilder::new("sys".to_string());
        let prompt = builder.build("c1", Channel::Other, Mode::DirectOnly, &[], "hi");
        assert!(!prompt.contains("Recent turns"));
    }

    #[test]
    fn includes_recent_turns_in_order() {
        let builder = PromptBuilder::new("sys".to_string());
        let turns = vec![
            ConversationRecord { role: Role::User, text: "q1".into() },
            ConversationRecord { role: Role::Assistant, text: "a1".into() },
        ];
        let prompt = builder.build("c1", Channel::Other, Mode::DirectOnly, &turns, "hi");
        let turns_idx = prompt.find("Recent turns").unwrap();
        let user_idx = prompt.find("USER: q1").unwrap();
        let asst_idx = prompt.find("ASSISTANT: a1").unwrap();
        assert!(turns_idx < user_idx);
        assert!(user_idx < asst_idx);
    }

    #[test]
    fn from_file_falls_back_to_default_when_missing() {
        let builder = PromptBuilder::from_file(Some("/nonexistent/prompt.md"));
        let prompt = builder.build("c1", Channel::Other, Mode::DirectOnly, &[], "hi");
        assert!(prompt.contains(DEFAULT_SYSTEM_PROMPT));
    }
}
