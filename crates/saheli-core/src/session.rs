//! Binding between the active conversation and a remote chat session.
//!
//! A session is rebuilt from scratch (full history replay) whenever the active
//! conversation changes; there is no incremental context carried over.

use crate::persona::Persona;
use crate::state::{ChatRole, Conversation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub conversation_id: String,
    pub history: Vec<Turn>,
    pub system_instruction: String,
}

impl ChatSession {
    /// Replay history from a conversation, skipping blank messages.
    pub fn bind(conversation: &Conversation, persona: &Persona) -> Self {
        let history = conversation
            .messages
            .iter()
            .filter(|m| !m.is_blank())
            .map(|m| Turn {
                role: m.role,
                text: m.text().to_string(),
            })
            .collect();

        Self {
            conversation_id: conversation.id.clone(),
            history,
            system_instruction: persona.instruction().to_string(),
        }
    }

    /// Request payload for sending `text` on top of this session's history.
    pub fn request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            history: self.history.clone(),
            system_instruction: self.system_instruction.clone(),
            message: text.to_string(),
        }
    }
}

/// Everything the chat service needs for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub history: Vec<Turn>,
    pub system_instruction: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;

    #[test]
    fn test_bind_filters_blank_messages_and_keeps_order() {
        let mut conv = Conversation::new("c1");
        conv.messages.push(ChatMessage::new("1", ChatRole::User, "नमस्ते"));
        conv.messages.push(ChatMessage::new("2", ChatRole::Model, ""));
        conv.messages.push(ChatMessage::new("3", ChatRole::Model, "हाय!"));
        conv.messages.push(ChatMessage::new("4", ChatRole::User, "   "));
        conv.messages.push(ChatMessage::new("5", ChatRole::User, "कैसी हो?"));

        let persona = Persona::with_instruction("stub instruction");
        let session = ChatSession::bind(&conv, &persona);

        assert_eq!(session.conversation_id, "c1");
        assert_eq!(session.system_instruction, "stub instruction");
        let texts: Vec<&str> = session.history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["नमस्ते", "हाय!", "कैसी हो?"]);
        assert_eq!(session.history[1].role, ChatRole::Model);
    }

    #[test]
    fn test_request_carries_history_and_new_text() {
        let mut conv = Conversation::new("c1");
        conv.messages.push(ChatMessage::new("1", ChatRole::User, "a"));
        let session = ChatSession::bind(&conv, &Persona::default());
        let request = session.request("b");
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.message, "b");
        assert!(request.system_instruction.contains("Laura"));
    }
}
