//! Assembly of a streamed model reply into the trailing model message.

use crate::store::ConversationStore;
use crate::state::{ChatMessage, ChatRole};

/// Fixed reply substituted for a failed turn.
pub const CHAT_APOLOGY: &str =
    "अरे यार, मेरे दिमाग का दही हो गया। कुछ गड़बड़ है, थोड़ी देर में फिर से कोशिश करना।";

/// State of one in-flight reply. Fragments are applied in arrival order and the
/// message always holds the cumulative text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAssembler {
    conversation_id: String,
    message_id: Option<String>,
    buffer: String,
}

impl ReplyAssembler {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: None,
            buffer: String::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Append the empty model placeholder. Idempotent.
    pub fn open(&mut self, store: &mut ConversationStore) {
        if self.message_id.is_some() {
            return;
        }
        let id = store.next_id();
        store.append_message(&self.conversation_id, ChatMessage::new(id.clone(), ChatRole::Model, ""));
        self.message_id = Some(id);
    }

    pub fn push(&mut self, store: &mut ConversationStore, fragment: &str) {
        self.open(store);
        self.buffer.push_str(fragment);
        if let Some(id) = &self.message_id {
            store.update_message_text(&self.conversation_id, id, &self.buffer);
        }
    }

    /// Replace the turn's output with the apology: the placeholder is
    /// overwritten if one exists, otherwise a new model message is appended.
    pub fn fail(self, store: &mut ConversationStore) {
        match &self.message_id {
            Some(id) => {
                store.update_message_text(&self.conversation_id, id, CHAT_APOLOGY);
            }
            None => {
                let id = store.next_id();
                store.append_message(
                    &self.conversation_id,
                    ChatMessage::new(id, ChatRole::Model, CHAT_APOLOGY),
                );
            }
        }
    }
}
