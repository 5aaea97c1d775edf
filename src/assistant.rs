//! Writing assistant capability.
//!
//! The assistant is switched off. Callers still go through [`Assistant`] so
//! they can check [`Assistant::is_enabled`] and report a disabled feature
//! instead of silently receiving placeholder text.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// Rewriting style for text correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CorrectionStyle {
    Fix,
    Professional,
    Academic,
    Simple,
    Concise,
    Casual,
    Persuasive,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssistantError {
    #[error("the assistant is disabled on this instance")]
    Disabled,
}

/// Conversational and text-correction capability.
pub trait Assistant: Send + Sync {
    /// Whether requests may succeed at all.
    fn is_enabled(&self) -> bool;

    /// Answer `message` given the previous `history`.
    fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, AssistantError>;

    /// Rewrite `text` in the requested `style`.
    fn correct_text(
        &self,
        text: &str,
        style: CorrectionStyle,
    ) -> Result<String, AssistantError>;
}

/// Assistant that refuses every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAssistant;

impl Assistant for DisabledAssistant {
    fn is_enabled(&self) -> bool {
        false
    }

    fn chat(
        &self,
        _history: &[ChatMessage],
        _message: &str,
    ) -> Result<String, AssistantError> {
        Err(AssistantError::Disabled)
    }

    fn correct_text(
        &self,
        _text: &str,
        _style: CorrectionStyle,
    ) -> Result<String, AssistantError> {
        Err(AssistantError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled() {
        let assistant = DisabledAssistant;
        let history = vec![ChatMessage {
            role: Role::User,
            text: "Bonjour".into(),
        }];

        assert!(!assistant.is_enabled());
        assert_eq!(
            assistant.chat(&history, "Quel est mon emploi du temps ?"),
            Err(AssistantError::Disabled)
        );
        assert_eq!(
            assistant.correct_text("bonjour", CorrectionStyle::Fix),
            Err(AssistantError::Disabled)
        );
    }

    #[test]
    fn test_style_wire_format() {
        let style: CorrectionStyle =
            serde_json::from_str("\"PROFESSIONAL\"").unwrap();
        assert_eq!(style, CorrectionStyle::Professional);

        let message: ChatMessage =
            serde_json::from_str(r#"{"role":"model","text":"hi"}"#).unwrap();
        assert_eq!(message.role, Role::Model);
    }
}
