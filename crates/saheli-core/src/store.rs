//! In-memory conversation list with a single active conversation.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::state::{title_from_text, ChatMessage, ChatRole, Conversation};

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

/// Issues time-derived ids that never repeat within a process.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> String {
        let now = now_unix_ms();
        self.last = if now > self.last { now } else { self.last + 1 };
        self.last.to_string()
    }

    /// Make sure ids already present (e.g. loaded from disk) are never reissued.
    pub fn observe(&mut self, id: &str) {
        if let Ok(value) = id.parse::<u64>() {
            self.last = self.last.max(value);
        }
    }
}

/// Conversations in display order (most recently created first).
///
/// The list always holds at least one conversation and `active_id` always
/// names one of them.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    ids: IdGenerator,
}

impl ConversationStore {
    /// Store seeded with one fresh, active conversation.
    pub fn new() -> Self {
        Self::from_conversations(Vec::new())
    }

    /// Store restored from persisted conversations; the first one becomes active.
    /// An empty list gets a fresh conversation.
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let mut ids = IdGenerator::default();
        for conv in &conversations {
            ids.observe(&conv.id);
            for msg in &conv.messages {
                ids.observe(&msg.id);
            }
        }
        let mut store = Self {
            active_id: conversations.first().map(|c| c.id.clone()),
            conversations,
            ids,
        };
        if store.conversations.is_empty() {
            store.create_conversation();
        }
        store
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn next_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// Insert a fresh conversation at the front of the list and make it active.
    pub fn create_conversation(&mut self) -> String {
        let id = self.ids.next_id();
        self.conversations.insert(0, Conversation::new(id.clone()));
        self.active_id = Some(id.clone());
        id
    }

    /// Activate a known conversation. Returns whether the active id changed.
    pub fn select_conversation(&mut self, id: &str) -> bool {
        if self.active_id.as_deref() == Some(id) || self.get(id).is_none() {
            return false;
        }
        self.active_id = Some(id.to_string());
        true
    }

    /// Remove a conversation. Returns whether the active id changed.
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return false;
        }

        if self.conversations.is_empty() {
            self.create_conversation();
            return true;
        }

        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
            return true;
        }
        false
    }

    /// Append to a conversation, titling it from the first user message.
    /// Returns false when the conversation does not exist.
    pub fn append_message(&mut self, conversation_id: &str, message: ChatMessage) -> bool {
        let Some(conv) = self.get_mut(conversation_id) else {
            return false;
        };
        if conv.messages.is_empty() && message.role == ChatRole::User {
            conv.title = title_from_text(message.text());
        }
        conv.messages.push(message);
        true
    }

    /// Replace the text of one message. Silently ignores unknown ids.
    pub fn update_message_text(&mut self, conversation_id: &str, message_id: &str, text: &str) -> bool {
        let Some(msg) = self
            .get_mut(conversation_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
        else {
            return false;
        };
        msg.set_text(text);
        true
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
