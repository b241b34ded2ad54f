//! Flat key-value persistence for conversation history and display settings.
//!
//! Two independent keys are used. Each value is rewritten whole, so a crash
//! between the two writes leaves both keys individually consistent.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;
use crate::state::{Background, Conversation};

pub const HISTORY_KEY: &str = "chatHistory";
pub const BACKGROUND_KEY: &str = "chatBackground";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Typed access to the two persisted keys.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Saved conversations. Missing or unreadable history yields an empty list.
    pub fn load_conversations(&self) -> Vec<Conversation> {
        match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(conversations) => conversations,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable chat history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read chat history: {}", e);
                Vec::new()
            }
        }
    }

    /// Write the full list, or drop the key when there is nothing to keep.
    pub fn save_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        if conversations.is_empty() {
            return self.store.remove(HISTORY_KEY);
        }
        let raw = serde_json::to_string(conversations)?;
        self.store.set(HISTORY_KEY, &raw)
    }

    pub fn load_background(&self) -> Background {
        match self.store.get(BACKGROUND_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable background preference: {}", e);
                Background::default()
            }),
            Ok(None) => Background::default(),
            Err(e) => {
                tracing::warn!("Failed to read background preference: {}", e);
                Background::default()
            }
        }
    }

    pub fn save_background(&self, background: &Background) -> Result<()> {
        let raw = serde_json::to_string(background)?;
        self.store.set(BACKGROUND_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChatMessage, ChatRole};
    use tempfile::TempDir;

    fn sample_conversation() -> Conversation {
        let mut conv = Conversation::new("1700000000000");
        conv.title = "नमस्ते".to_string();
        conv.messages.push(ChatMessage::new("1700000000001", ChatRole::User, "नमस्ते"));
        conv
    }

    #[test]
    fn test_file_store_round_trips_history() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(FileStore::new(dir.path()));
        let conversations = vec![sample_conversation()];

        persistence.save_conversations(&conversations).unwrap();
        assert!(dir.path().join("chatHistory.json").exists());
        assert!(!dir.path().join("chatHistory.json.tmp").exists());
        assert_eq!(persistence.load_conversations(), conversations);
    }

    #[test]
    fn test_empty_list_removes_history_key() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(FileStore::new(dir.path()));
        persistence.save_conversations(&[sample_conversation()]).unwrap();
        persistence.save_conversations(&[]).unwrap();
        assert!(!dir.path().join("chatHistory.json").exists());
        assert!(persistence.load_conversations().is_empty());
    }

    #[test]
    fn test_corrupt_history_is_treated_as_absent() {
        let store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not json").unwrap();
        let persistence = Persistence::new(store);
        assert!(persistence.load_conversations().is_empty());
    }

    #[test]
    fn test_background_defaults_and_persists_independently() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(FileStore::new(dir.path()));
        assert_eq!(persistence.load_background(), Background::default());

        persistence.save_background(&Background::glass()).unwrap();
        assert_eq!(persistence.load_background(), Background::glass());
        assert!(!dir.path().join("chatHistory.json").exists());
    }

    #[test]
    fn test_reads_history_written_by_older_clients() {
        let store = MemoryStore::new();
        store
            .set(
                HISTORY_KEY,
                r#"[{"id":"1","title":"hi","messages":[{"role":"user","parts":[{"text":"hi"}],"id":"2"}]}]"#,
            )
            .unwrap();
        let persistence = Persistence::new(store);
        let loaded = persistence.load_conversations();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].messages[0].text(), "hi");
        assert_eq!(loaded[0].messages[0].role, ChatRole::User);
    }
}
