//! UI-agnostic conversation types
//!
//! These are the records persisted on disk and shared by every front-end. The
//! serialized shape (camelCase, `parts` arrays, `user`/`model` roles) is the
//! same layout older clients wrote, so existing history files keep loading.

use serde::{Deserialize, Serialize};

/// Title shown for a conversation before its first user message.
pub const NEW_CONVERSATION_TITLE: &str = "नई बातचीत";

/// Maximum number of characters taken from the first message for a title.
pub const TITLE_MAX_CHARS: usize = 40;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// A chat message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub parts: Vec<Part>,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// Text of the message. Every message the client creates has exactly one part.
    pub fn text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or("")
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.parts = vec![Part { text: text.into() }];
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: NEW_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// The most recent model message, which always shows its speak/copy actions.
    pub fn last_model_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == ChatRole::Model)
    }
}

/// Derive a conversation title from its first user message.
pub fn title_from_text(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    #[default]
    Default,
    Color,
    Glass,
}

/// Global display preference, persisted independently of conversations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Background {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    pub value: String,
}

/// Colour presets offered by the background picker.
pub const BACKGROUND_COLORS: [&str; 3] = ["#FFFFFF", "#F5F5F4", "#000000"];

impl Background {
    pub fn color(value: impl Into<String>) -> Self {
        Self {
            kind: BackgroundKind::Color,
            value: value.into(),
        }
    }

    pub fn glass() -> Self {
        Self {
            kind: BackgroundKind::Glass,
            value: "glass".to_string(),
        }
    }

    /// Dark backgrounds switch the foreground palette to light text.
    pub fn is_dark(&self) -> bool {
        match self.kind {
            BackgroundKind::Glass => true,
            BackgroundKind::Color => self.value == "#000000",
            BackgroundKind::Default => false,
        }
    }

    /// Parse a `#RRGGBB` colour value.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        if self.kind != BackgroundKind::Color {
            return None;
        }
        let hex = self.value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_short_text_kept() {
        assert_eq!(title_from_text("नमस्ते"), "नमस्ते");
    }

    #[test]
    fn test_title_truncated_by_chars() {
        let text = "क".repeat(45);
        let title = title_from_text(&text);
        assert_eq!(title, format!("{}...", "क".repeat(40)));
    }

    #[test]
    fn test_title_exactly_forty_has_no_ellipsis() {
        let text = "a".repeat(40);
        assert_eq!(title_from_text(&text), text);
    }

    #[test]
    fn test_message_serializes_in_history_layout() {
        let msg = ChatMessage::new("1", ChatRole::Model, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "1", "role": "model", "parts": [{"text": "hi"}]})
        );
    }

    #[test]
    fn test_background_layout_and_darkness() {
        let bg: Background = serde_json::from_str(r##"{"type":"color","value":"#000000"}"##).unwrap();
        assert!(bg.is_dark());
        assert_eq!(bg.rgb(), Some((0, 0, 0)));
        assert!(Background::glass().is_dark());
        assert!(!Background::default().is_dark());
        assert!(!Background::color("#F5F5F4").is_dark());
    }

    #[test]
    fn test_blank_message() {
        assert!(ChatMessage::new("1", ChatRole::Model, "  \n").is_blank());
        assert!(!ChatMessage::new("1", ChatRole::User, "x").is_blank());
    }
}
