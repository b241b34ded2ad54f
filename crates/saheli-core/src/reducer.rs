//! Application state and its single update function.
//!
//! Front-ends never mutate [`AppState`] directly: they dispatch an [`Action`]
//! and execute the returned [`Effect`]s, feeding async results back in as
//! further actions.
//!
//! Each send opens a numbered turn. Stream actions carry that number, so a
//! reply that outlives a "new chat" keeps filling its own conversation
//! without touching the turn that replaced it.

use std::collections::HashMap;

use crate::assembler::{ReplyAssembler, CHAT_APOLOGY};
use crate::persona::Persona;
use crate::playback::SPEECH_SAMPLE_RATE;
use crate::session::{ChatRequest, ChatSession};
use crate::speech::{SpeechOutput, SpeechRequest, SPEECH_ERROR};
use crate::state::{Background, ChatMessage, ChatRole, Conversation};
use crate::storage::Persistence;
use crate::store::ConversationStore;

/// Shown once when the chat client cannot be constructed.
pub const CLIENT_INIT_ERROR: &str =
    "API कुंजी प्रारंभ करने में विफल। कृपया सुनिश्चित करें कि यह सही ढंग से कॉन्फ़िगर है।";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ClientReady,
    ClientFailed(String),
    NewConversation,
    SelectConversation(String),
    DeleteConversation(String),
    SendMessage(String),
    StreamOpened { turn: u64 },
    StreamFragment { turn: u64, text: String },
    StreamCompleted { turn: u64 },
    StreamFailed { turn: u64, error: String },
    ToggleSpeak(String),
    SpeechReady { utterance: u64, payload: Option<String> },
    SpeechFailed { utterance: u64, error: String },
    PlaybackFinished { utterance: u64 },
    PlaybackFailed { utterance: u64, error: String },
    SelectMessage(String),
    SetBackground(Background),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistConversations,
    PersistBackground,
    /// Halt and release the live playback handle, if any.
    StopPlayback,
    OpenChatStream { turn: u64, request: ChatRequest },
    SynthesizeSpeech(SpeechRequest),
    Play {
        utterance: u64,
        samples: Vec<f32>,
        sample_rate: u32,
    },
}

#[derive(Debug, Clone)]
pub struct AppState {
    store: ConversationStore,
    background: Background,
    persona: Persona,
    client_ready: bool,
    client_error: Option<String>,
    session: Option<ChatSession>,
    turn: u64,
    /// Turn whose reply blocks the input line.
    pending: Option<u64>,
    replies: HashMap<u64, ReplyAssembler>,
    error: Option<String>,
    selected_message: Option<String>,
    speech: SpeechOutput,
}

impl AppState {
    pub fn new(conversations: Vec<Conversation>, background: Background, persona: Persona) -> Self {
        Self {
            store: ConversationStore::from_conversations(conversations),
            background,
            persona,
            client_ready: false,
            client_error: None,
            session: None,
            turn: 0,
            pending: None,
            replies: HashMap::new(),
            error: None,
            selected_message: None,
            speech: SpeechOutput::new(),
        }
    }

    /// Restore conversations and background from persistence.
    pub fn load(persistence: &Persistence, persona: Persona) -> Self {
        let conversations = persistence.load_conversations();
        tracing::info!("Loaded {} saved conversations", conversations.len());
        Self::new(conversations, persistence.load_background(), persona)
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.store.active_id()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.store.active()
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn client_error(&self) -> Option<&str> {
        self.client_error.as_deref()
    }

    pub fn selected_message(&self) -> Option<&str> {
        self.selected_message.as_deref()
    }

    pub fn speaking(&self) -> Option<&str> {
        self.speech.speaking()
    }

    pub fn tts_loading(&self) -> Option<&str> {
        self.speech.loading()
    }

    pub fn can_send(&self) -> bool {
        self.pending.is_none() && self.session.is_some()
    }

    /// Id of the streamed reply message once its placeholder exists.
    pub fn reply_message_id(&self) -> Option<&str> {
        self.pending
            .and_then(|turn| self.replies.get(&turn))
            .and_then(|r| r.message_id())
    }

    pub fn apply(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::ClientReady => {
                self.client_ready = true;
                self.client_error = None;
                self.rebind();
                Vec::new()
            }
            Action::ClientFailed(reason) => {
                tracing::error!("Chat client unavailable: {}", reason);
                self.client_ready = false;
                self.session = None;
                self.client_error = Some(CLIENT_INIT_ERROR.to_string());
                Vec::new()
            }
            Action::NewConversation => {
                self.store.create_conversation();
                // An unfinished reply keeps streaming into its own conversation
                self.pending = None;
                self.error = None;
                self.selected_message = None;
                self.speech.stop();
                self.rebind();
                vec![Effect::StopPlayback, Effect::PersistConversations]
            }
            Action::SelectConversation(id) => {
                if !self.store.select_conversation(&id) {
                    return Vec::new();
                }
                self.selected_message = None;
                self.speech.stop();
                self.rebind();
                vec![Effect::StopPlayback]
            }
            Action::DeleteConversation(id) => {
                let before = self.store.len();
                let active_changed = self.store.delete_conversation(&id);
                if active_changed {
                    self.selected_message = None;
                    self.rebind();
                }
                if self.store.len() == before && !active_changed {
                    return Vec::new();
                }
                vec![Effect::PersistConversations]
            }
            Action::SendMessage(text) => self.send_message(text),
            Action::StreamOpened { turn } => {
                let Some(reply) = self.replies.get_mut(&turn) else {
                    return Vec::new();
                };
                reply.open(&mut self.store);
                vec![Effect::PersistConversations]
            }
            Action::StreamFragment { turn, text } => {
                let Some(reply) = self.replies.get_mut(&turn) else {
                    return Vec::new();
                };
                reply.push(&mut self.store, &text);
                vec![Effect::PersistConversations]
            }
            Action::StreamCompleted { turn } => {
                if self.replies.remove(&turn).is_none() {
                    return Vec::new();
                }
                self.finish_turn(turn);
                vec![Effect::PersistConversations]
            }
            Action::StreamFailed { turn, error } => {
                let Some(reply) = self.replies.remove(&turn) else {
                    return Vec::new();
                };
                tracing::warn!(turn, "Chat stream failed: {}", error);
                reply.fail(&mut self.store);
                if self.pending == Some(turn) {
                    self.error = Some(CHAT_APOLOGY.to_string());
                }
                self.finish_turn(turn);
                vec![Effect::PersistConversations]
            }
            Action::ToggleSpeak(message_id) => self.toggle_speak(&message_id),
            Action::SpeechReady { utterance, payload } => {
                match self.speech.audio_ready(utterance, payload.as_deref()) {
                    Ok(Some(samples)) => vec![Effect::Play {
                        utterance,
                        samples,
                        sample_rate: SPEECH_SAMPLE_RATE,
                    }],
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        tracing::warn!("Speech payload rejected: {}", e);
                        self.error = Some(SPEECH_ERROR.to_string());
                        Vec::new()
                    }
                }
            }
            Action::SpeechFailed { utterance, error } | Action::PlaybackFailed { utterance, error } => {
                if self.speech.failed(utterance) {
                    tracing::warn!("Speech failed: {}", error);
                    self.error = Some(SPEECH_ERROR.to_string());
                }
                Vec::new()
            }
            Action::PlaybackFinished { utterance } => {
                self.speech.finished(utterance);
                Vec::new()
            }
            Action::SelectMessage(id) => {
                if self.selected_message.as_deref() == Some(id.as_str()) {
                    self.selected_message = None;
                } else {
                    self.selected_message = Some(id);
                }
                Vec::new()
            }
            Action::SetBackground(background) => {
                self.background = background;
                vec![Effect::PersistBackground]
            }
        }
    }

    fn send_message(&mut self, text: String) -> Vec<Effect> {
        if text.trim().is_empty() || self.pending.is_some() {
            return Vec::new();
        }
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let conversation_id = session.conversation_id.clone();
        let request = session.request(&text);

        self.error = None;
        self.selected_message = None;
        self.speech.stop();

        let message_id = self.store.next_id();
        self.store
            .append_message(&conversation_id, ChatMessage::new(message_id, ChatRole::User, text));
        self.turn += 1;
        let turn = self.turn;
        self.pending = Some(turn);
        self.replies.insert(turn, ReplyAssembler::new(conversation_id));

        vec![
            Effect::StopPlayback,
            Effect::PersistConversations,
            Effect::OpenChatStream { turn, request },
        ]
    }

    fn finish_turn(&mut self, turn: u64) {
        if self.pending == Some(turn) {
            self.pending = None;
        }
        self.rebind();
    }

    fn toggle_speak(&mut self, message_id: &str) -> Vec<Effect> {
        if !self.client_ready {
            return Vec::new();
        }
        let Some(text) = self
            .store
            .active()
            .and_then(|c| c.message(message_id))
            .map(|m| m.text().to_string())
        else {
            return Vec::new();
        };

        let command = self.speech.toggle(message_id, &text);
        let mut effects = vec![Effect::StopPlayback];
        if let Some(request) = command.request {
            effects.push(Effect::SynthesizeSpeech(request));
        }
        effects
    }

    /// Replay the active conversation into a fresh session.
    fn rebind(&mut self) {
        if !self.client_ready {
            self.session = None;
            return;
        }
        self.session = self
            .store
            .active()
            .map(|conversation| ChatSession::bind(conversation, &self.persona));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NEW_CONVERSATION_TITLE;
    use crate::storage::MemoryStore;

    fn ready_state() -> AppState {
        let mut state = AppState::new(
            Vec::new(),
            Background::default(),
            Persona::with_instruction("stub instruction"),
        );
        state.apply(Action::ClientReady);
        state
    }

    /// Send `text` and return the turn it opened.
    fn send(state: &mut AppState, text: &str) -> u64 {
        state
            .apply(Action::SendMessage(text.to_string()))
            .iter()
            .find_map(|e| match e {
                Effect::OpenChatStream { turn, .. } => Some(*turn),
                _ => None,
            })
            .unwrap()
    }

    fn fragment(turn: u64, text: &str) -> Action {
        Action::StreamFragment { turn, text: text.to_string() }
    }

    fn active_messages(state: &AppState) -> Vec<(ChatRole, String)> {
        state
            .active_conversation()
            .unwrap()
            .messages
            .iter()
            .map(|m| (m.role, m.text().to_string()))
            .collect()
    }

    #[test]
    fn test_first_message_titles_conversation_and_streams_reply() {
        let mut state = ready_state();
        let effects = state.apply(Action::SendMessage("नमस्ते".to_string()));

        let (turn, request) = effects
            .iter()
            .find_map(|e| match e {
                Effect::OpenChatStream { turn, request } => Some((*turn, request.clone())),
                _ => None,
            })
            .unwrap();
        assert!(request.history.is_empty());
        assert_eq!(request.message, "नमस्ते");
        assert_eq!(request.system_instruction, "stub instruction");

        assert_eq!(state.active_conversation().unwrap().title, "नमस्ते");
        assert_eq!(active_messages(&state), vec![(ChatRole::User, "नमस्ते".to_string())]);
        assert!(state.is_loading());

        state.apply(Action::StreamOpened { turn });
        for text in ["a", "b", "c"] {
            state.apply(fragment(turn, text));
        }
        state.apply(Action::StreamCompleted { turn });

        assert!(!state.is_loading());
        assert_eq!(
            active_messages(&state),
            vec![
                (ChatRole::User, "नमस्ते".to_string()),
                (ChatRole::Model, "abc".to_string()),
            ]
        );
        assert_eq!(state.session().unwrap().history.len(), 2);
    }

    #[test]
    fn test_stream_failure_before_placeholder_appends_apology() {
        let mut state = ready_state();
        let turn = send(&mut state, "hi");
        state.apply(Action::StreamFailed {
            turn,
            error: "connection reset".to_string(),
        });

        let messages = active_messages(&state);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], (ChatRole::Model, CHAT_APOLOGY.to_string()));
        assert!(!state.is_loading());
        assert_eq!(state.error(), Some(CHAT_APOLOGY));
    }

    #[test]
    fn test_send_preconditions_are_silent_noops() {
        let mut state = AppState::new(Vec::new(), Background::default(), Persona::default());
        assert!(state.apply(Action::SendMessage("hi".to_string())).is_empty());

        let mut state = ready_state();
        assert!(state.apply(Action::SendMessage("   ".to_string())).is_empty());
        state.apply(Action::SendMessage("first".to_string()));
        assert!(state.apply(Action::SendMessage("second".to_string())).is_empty());
        assert_eq!(active_messages(&state).len(), 1);
    }

    #[test]
    fn test_client_failure_is_persistent_and_disables_sending() {
        let mut state = AppState::new(Vec::new(), Background::default(), Persona::default());
        state.apply(Action::ClientFailed("no key".to_string()));
        assert_eq!(state.client_error(), Some(CLIENT_INIT_ERROR));
        assert!(!state.can_send());
        state.apply(Action::NewConversation);
        assert!(!state.can_send());
        assert_eq!(state.client_error(), Some(CLIENT_INIT_ERROR));
    }

    #[test]
    fn test_session_replays_history_on_switch() {
        let mut state = ready_state();
        let turn = send(&mut state, "one");
        state.apply(fragment(turn, "reply"));
        state.apply(Action::StreamCompleted { turn });
        let first = state.active_id().unwrap().to_string();

        state.apply(Action::NewConversation);
        assert!(state.session().unwrap().history.is_empty());

        let effects = state.apply(Action::SelectConversation(first.clone()));
        assert_eq!(effects, vec![Effect::StopPlayback]);
        let session = state.session().unwrap();
        assert_eq!(session.conversation_id, first);
        assert_eq!(session.history.len(), 2);
    }

    #[test]
    fn test_reply_stays_with_its_conversation_after_switch() {
        let mut state = ready_state();
        let original = state.active_id().unwrap().to_string();
        let turn = send(&mut state, "hi");
        state.apply(Action::NewConversation);
        state.apply(fragment(turn, "late"));
        state.apply(Action::StreamCompleted { turn });

        assert!(state.active_conversation().unwrap().messages.is_empty());
        let conv = state.conversations().iter().find(|c| c.id == original).unwrap();
        assert_eq!(conv.messages.last().unwrap().text(), "late");
    }

    #[test]
    fn test_new_conversation_releases_hung_stream() {
        let mut state = ready_state();
        let original = state.active_id().unwrap().to_string();
        let hung = send(&mut state, "hi");

        state.apply(Action::NewConversation);
        assert!(!state.is_loading());
        assert!(state.can_send());

        let fresh = send(&mut state, "fresh");
        assert_ne!(fresh, hung);
        state.apply(Action::StreamOpened { turn: fresh });
        state.apply(fragment(fresh, "new"));

        // The old turn finishes late and must not touch the new reply
        state.apply(Action::StreamOpened { turn: hung });
        state.apply(fragment(hung, "old"));
        state.apply(Action::StreamFailed {
            turn: hung,
            error: "timed out".to_string(),
        });
        assert!(state.is_loading());
        assert_eq!(state.error(), None);
        assert_eq!(
            active_messages(&state),
            vec![
                (ChatRole::User, "fresh".to_string()),
                (ChatRole::Model, "new".to_string()),
            ]
        );
        let reply_id = state.reply_message_id().unwrap().to_string();
        assert_eq!(state.active_conversation().unwrap().messages[1].id, reply_id);

        let old = state.conversations().iter().find(|c| c.id == original).unwrap();
        assert_eq!(old.messages.last().unwrap().text(), CHAT_APOLOGY);

        state.apply(Action::StreamCompleted { turn: fresh });
        assert!(!state.is_loading());
        assert!(state.apply(fragment(fresh, "after")).is_empty());
        assert_eq!(active_messages(&state)[1].1, "new");
    }

    #[test]
    fn test_delete_active_and_last_conversation() {
        let mut state = ready_state();
        let only = state.active_id().unwrap().to_string();
        let effects = state.apply(Action::DeleteConversation(only.clone()));
        assert_eq!(effects, vec![Effect::PersistConversations]);
        assert_eq!(state.conversations().len(), 1);
        assert_ne!(state.active_id().unwrap(), only);
        assert_eq!(state.active_conversation().unwrap().title, NEW_CONVERSATION_TITLE);
        assert!(state.session().is_some());
    }

    #[test]
    fn test_delete_unknown_conversation_is_noop() {
        let mut state = ready_state();
        assert!(state.apply(Action::DeleteConversation("nope".to_string())).is_empty());
    }

    #[test]
    fn test_speak_toggle_lifecycle() {
        let mut state = ready_state();
        let turn = send(&mut state, "hi");
        state.apply(fragment(turn, "जवाब"));
        state.apply(Action::StreamCompleted { turn });
        let model_id = state.active_conversation().unwrap().messages[1].id.clone();
        let user_id = state.active_conversation().unwrap().messages[0].id.clone();

        let effects = state.apply(Action::ToggleSpeak(model_id.clone()));
        let request = match &effects[..] {
            [Effect::StopPlayback, Effect::SynthesizeSpeech(r)] => r.clone(),
            other => panic!("unexpected effects: {:?}", other),
        };
        assert_eq!(request.text, "जवाब");
        assert_eq!(state.speaking(), Some(model_id.as_str()));
        assert_eq!(state.tts_loading(), Some(model_id.as_str()));

        let payload = "AEA=".to_string(); // [0x00, 0x40] -> 0.5
        let effects = state.apply(Action::SpeechReady {
            utterance: request.utterance,
            payload: Some(payload),
        });
        assert_eq!(
            effects,
            vec![Effect::Play {
                utterance: request.utterance,
                samples: vec![0.5],
                sample_rate: 24_000
            }]
        );
        assert_eq!(state.tts_loading(), None);

        // switching to another message stops the first before requesting
        let effects = state.apply(Action::ToggleSpeak(user_id.clone()));
        assert_eq!(effects[0], Effect::StopPlayback);
        assert_eq!(state.speaking(), Some(user_id.as_str()));

        // toggling the speaking message again only stops
        let effects = state.apply(Action::ToggleSpeak(user_id));
        assert_eq!(effects, vec![Effect::StopPlayback]);
        assert_eq!(state.speaking(), None);
    }

    #[test]
    fn test_speech_failure_sets_error_and_clears_markers() {
        let mut state = ready_state();
        state.apply(Action::SendMessage("hi".to_string()));
        let user_id = state.active_conversation().unwrap().messages[0].id.clone();
        let effects = state.apply(Action::ToggleSpeak(user_id));
        let Some(Effect::SynthesizeSpeech(request)) = effects.last().cloned() else {
            panic!("expected speech request");
        };
        state.apply(Action::SpeechReady { utterance: request.utterance, payload: None });
        assert_eq!(state.speaking(), None);
        assert_eq!(state.tts_loading(), None);
        assert_eq!(state.error(), Some(SPEECH_ERROR));
    }

    #[test]
    fn test_new_message_stops_speech() {
        let mut state = ready_state();
        let turn = send(&mut state, "hi");
        state.apply(Action::StreamCompleted { turn });
        let user_id = state.active_conversation().unwrap().messages[0].id.clone();
        state.apply(Action::ToggleSpeak(user_id));
        let effects = state.apply(Action::SendMessage("again".to_string()));
        assert_eq!(effects[0], Effect::StopPlayback);
        assert_eq!(state.speaking(), None);
    }

    #[test]
    fn test_select_message_toggles() {
        let mut state = ready_state();
        state.apply(Action::SelectMessage("m".to_string()));
        assert_eq!(state.selected_message(), Some("m"));
        state.apply(Action::SelectMessage("m".to_string()));
        assert_eq!(state.selected_message(), None);
    }

    #[test]
    fn test_background_change_persists() {
        let mut state = ready_state();
        let effects = state.apply(Action::SetBackground(Background::glass()));
        assert_eq!(effects, vec![Effect::PersistBackground]);
        assert!(state.background().is_dark());
    }

    #[test]
    fn test_load_restores_first_conversation_as_active() {
        let persistence = Persistence::new(MemoryStore::new());
        let mut a = Conversation::new("2");
        a.title = "second".to_string();
        let b = Conversation::new("1");
        persistence.save_conversations(&[a, b]).unwrap();
        persistence.save_background(&Background::color("#000000")).unwrap();

        let state = AppState::load(&persistence, Persona::default());
        assert_eq!(state.active_id(), Some("2"));
        assert_eq!(state.conversations().len(), 2);
        assert!(state.background().is_dark());
    }
}
