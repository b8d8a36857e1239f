//! Prompt building
//!
//! Renders a chat history into the Qwen-style `<|im_start|>` template the
//! completion server expects, with a trailing generation prompt for the
//! assistant turn.

use std::fmt;

use serde::{Deserialize, Serialize};

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Chat prompt template
#[derive(Debug, Clone, Default)]
pub struct ChatTemplate {
    /// Optional system prompt prepended to every history
    pub system_prompt: Option<String>,
}

impl ChatTemplate {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self { system_prompt }
    }

    /// Render a chat history into one completion prompt.
    ///
    /// Each message becomes `<|im_start|>role\ncontent<|im_end|>\n`; the
    /// result ends with the assistant generation prompt so the server
    /// continues from the assistant turn.
    pub fn format_prompt(&self, history: &[Message]) -> String {
        let mut prompt = String::new();

        if let Some(system) = &self.system_prompt {
            push_message(&mut prompt, Role::System, system);
        }

        for message in history {
            push_message(&mut prompt, message.role, &message.content);
        }

        prompt.push_str(IM_START);
        prompt.push_str("assistant\n");
        prompt
    }
}

fn push_message(prompt: &mut String, role: Role, content: &str) {
    prompt.push_str(IM_START);
    prompt.push_str(&role.to_string());
    prompt.push('\n');
    prompt.push_str(content);
    prompt.push_str(IM_END);
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_turn() {
        let template = ChatTemplate::default();
        let prompt = template.format_prompt(&[Message::user("hello")]);
        assert_eq!(
            prompt,
            "<|im_start|>user\nhello<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_system_prompt_comes_first() {
        let template = ChatTemplate::new(Some("Be brief.".to_string()));
        let prompt = template.format_prompt(&[Message::user("hi")]);
        assert!(prompt.starts_with("<|im_start|>system\nBe brief.<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_message_serialization() {
        let message = Message::user("hello");
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
