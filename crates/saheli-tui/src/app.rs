use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use saheli_core::recognizer::RecognizerProcess;
use saheli_core::speech::SpeechRequest;
use saheli_core::speech_input::{InputUpdate, ListenCommand, RecognitionEvent, SpeechInput};
use saheli_core::state::BACKGROUND_COLORS;
use saheli_core::{
    Action, AppState, AudioOutput, Background, ChatMessage, ChatRole, Config, Effect, GeminiClient,
    Persistence, PlaybackSlot,
};
use saheli_core::session::ChatRequest;
use tokio::sync::mpsc;

use crate::audio::{RodioHandle, RodioOutput};
use crate::tui::{AppEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Timeline,
    Sidebar,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub state: AppState,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Input line
    pub input: String,
    pub input_cursor: usize, // in chars, not bytes

    // Sidebar drawer
    pub show_sidebar: bool,
    pub sidebar_state: ListState,
    /// Conversation awaiting a y/n answer in the delete modal.
    pub confirm_delete: Option<String>,

    // Timeline scrolling
    pub timeline_scroll: u16,
    pub timeline_height: u16,
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub timeline_area: Option<Rect>,
    pub sidebar_area: Option<Rect>,

    /// Transient status line (clipboard feedback and the like).
    pub notice: Option<String>,

    // Services
    persistence: Persistence,
    client: Option<GeminiClient>,
    events: EventSender,
    audio: RodioOutput,
    playback: PlaybackSlot<RodioHandle>,

    // Voice input
    pub speech_input: SpeechInput,
    recognizer: Option<RecognizerProcess>,
    recognizer_session: u64,
    recognizer_command: Option<Vec<String>>,
    speech_language: String,
}

impl App {
    pub fn new(config: &Config, persistence: Persistence, events: EventSender) -> Self {
        let state = AppState::load(&persistence, config.persona());

        let recognizer_command = config
            .recognizer_command
            .clone()
            .filter(|argv| !argv.is_empty());
        let speech_input = SpeechInput::new(recognizer_command.is_some());

        let mut sidebar_state = ListState::default();
        sidebar_state.select(Some(0));

        let mut app = Self {
            should_quit: false,
            state,
            input_mode: InputMode::Editing,
            focus: FocusPane::Timeline,

            input: String::new(),
            input_cursor: 0,

            show_sidebar: false,
            sidebar_state,
            confirm_delete: None,

            timeline_scroll: 0,
            timeline_height: 0,
            follow_bottom: true,

            animation_frame: 0,

            timeline_area: None,
            sidebar_area: None,

            notice: None,

            persistence,
            client: None,
            events,
            audio: RodioOutput::new(),
            playback: PlaybackSlot::new(),

            speech_input,
            recognizer: None,
            recognizer_session: 0,
            recognizer_command,
            speech_language: config.speech_language.clone(),
        };

        match GeminiClient::from_config(config) {
            Ok(client) => {
                tracing::info!("Chat client ready (model {})", config.chat_model);
                app.client = Some(client);
                app.dispatch(Action::ClientReady);
            }
            Err(e) => app.dispatch(Action::ClientFailed(e.to_string())),
        }

        app
    }

    /// Run one action through the reducer and carry out what it asks for.
    pub fn dispatch(&mut self, action: Action) {
        for effect in self.state.apply(action) {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::PersistConversations => {
                if let Err(e) = self.persistence.save_conversations(self.state.conversations()) {
                    tracing::warn!("Failed to save conversations: {}", e);
                }
            }
            Effect::PersistBackground => {
                if let Err(e) = self.persistence.save_background(self.state.background()) {
                    tracing::warn!("Failed to save background: {}", e);
                }
            }
            Effect::StopPlayback => self.playback.clear(),
            Effect::OpenChatStream { turn, request } => self.spawn_chat(turn, request),
            Effect::SynthesizeSpeech(request) => self.spawn_speech(request),
            Effect::Play { utterance, samples, sample_rate } => {
                match self.audio.play(samples, sample_rate) {
                    Ok(handle) => self.playback.replace(utterance, handle),
                    Err(e) => self.dispatch(Action::PlaybackFailed {
                        utterance,
                        error: e.to_string(),
                    }),
                }
            }
        }
    }

    fn spawn_chat(&mut self, turn: u64, request: ChatRequest) {
        let Some(client) = self.client.clone() else {
            self.dispatch(Action::StreamFailed {
                turn,
                error: "chat client unavailable".to_string(),
            });
            return;
        };
        let tx = self.events.clone();
        let send = move |action: Action| tx.send(AppEvent::Action(action)).is_ok();

        tokio::spawn(async move {
            let mut stream = match client.stream_chat(&request).await {
                Ok(stream) => stream,
                Err(e) => {
                    send(Action::StreamFailed { turn, error: e.to_string() });
                    return;
                }
            };
            tracing::info!(turn, "Chat stream opened");
            if !send(Action::StreamOpened { turn }) {
                return;
            }

            while let Some(item) = stream.next_fragment().await {
                match item {
                    Ok(fragment) => {
                        if !send(Action::StreamFragment { turn, text: fragment }) {
                            return;
                        }
                    }
                    Err(e) => {
                        send(Action::StreamFailed { turn, error: e.to_string() });
                        return;
                    }
                }
            }
            tracing::info!(turn, "Chat stream completed");
            send(Action::StreamCompleted { turn });
        });
    }

    fn spawn_speech(&mut self, request: SpeechRequest) {
        let utterance = request.utterance;
        let Some(client) = self.client.clone() else {
            self.dispatch(Action::SpeechFailed {
                utterance,
                error: "chat client unavailable".to_string(),
            });
            return;
        };
        let tx = self.events.clone();

        tracing::info!("Requesting speech for message {}", request.message_id);
        tokio::spawn(async move {
            let action = match client.synthesize_speech(&request.text).await {
                Ok(payload) => Action::SpeechReady { utterance, payload },
                Err(e) => Action::SpeechFailed {
                    utterance,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(AppEvent::Action(action));
        });
    }

    /// Tick animation frame and notice playback that ended on its own.
    pub fn on_tick(&mut self) {
        if self.state.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(utterance) = self.playback.take_finished() {
            self.dispatch(Action::PlaybackFinished { utterance });
        }
    }

    // Timeline helpers

    /// Messages shown in the timeline; blank placeholders are hidden.
    pub fn visible_messages(&self) -> Vec<&ChatMessage> {
        self.state
            .active_conversation()
            .map(|c| c.messages.iter().filter(|m| !m.is_blank()).collect())
            .unwrap_or_default()
    }

    /// The message speak/copy apply to: the selection, else the last model reply.
    pub fn action_target(&self) -> Option<&ChatMessage> {
        let conversation = self.state.active_conversation()?;
        let message = match self.state.selected_message() {
            Some(id) => conversation.message(id),
            None => conversation.last_model_message(),
        }?;
        (!message.is_blank()).then_some(message)
    }

    pub fn select_next_message(&mut self) {
        self.move_selection(1);
    }

    pub fn select_prev_message(&mut self) {
        self.move_selection(-1);
    }

    fn move_selection(&mut self, delta: isize) {
        let ids: Vec<String> = self.visible_messages().iter().map(|m| m.id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        let current = self
            .state
            .selected_message()
            .and_then(|id| ids.iter().position(|m| m == id));
        let next = match current {
            Some(idx) => (idx as isize + delta).clamp(0, ids.len() as isize - 1) as usize,
            None if delta < 0 => ids.len() - 1,
            None => 0,
        };
        if current != Some(next) {
            self.dispatch(Action::SelectMessage(ids[next].clone()));
        }
    }

    pub fn clear_selection(&mut self) {
        if let Some(id) = self.state.selected_message().map(str::to_string) {
            self.dispatch(Action::SelectMessage(id));
        }
    }

    pub fn speak_target(&mut self) {
        if let Some(id) = self.action_target().map(|m| m.id.clone()) {
            self.dispatch(Action::ToggleSpeak(id));
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.timeline_scroll = self.timeline_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.timeline_scroll = self.timeline_scroll.saturating_add(lines);
    }

    // Input line

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
    }

    pub fn set_input(&mut self, text: String) {
        self.input_cursor = text.chars().count();
        self.input = text;
    }

    /// Send the input line. Listening stops first; the text is kept as typed.
    pub fn submit(&mut self) {
        if self.speech_input.submit() == Some(ListenCommand::Stop) {
            self.stop_recognizer();
        }
        if self.input.trim().is_empty() || !self.state.can_send() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.follow_bottom = true;
        self.dispatch(Action::SendMessage(text));
    }

    // Sidebar

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
        if self.show_sidebar {
            let active = self
                .state
                .conversations()
                .iter()
                .position(|c| Some(c.id.as_str()) == self.state.active_id());
            self.sidebar_state.select(active.or(Some(0)));
            self.focus = FocusPane::Sidebar;
            self.input_mode = InputMode::Normal;
        } else {
            self.focus = FocusPane::Timeline;
        }
    }

    pub fn sidebar_down(&mut self) {
        let len = self.state.conversations().len();
        if len == 0 {
            return;
        }
        let i = self.sidebar_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.sidebar_state.select(Some(i));
    }

    pub fn sidebar_up(&mut self) {
        let i = self.sidebar_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.sidebar_state.select(Some(i));
    }

    fn sidebar_selected_id(&self) -> Option<String> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.state.conversations().get(i))
            .map(|c| c.id.clone())
    }

    /// Open the highlighted conversation and close the drawer.
    pub fn open_selected_conversation(&mut self) {
        if let Some(id) = self.sidebar_selected_id() {
            self.dispatch(Action::SelectConversation(id));
            self.follow_bottom = true;
            self.show_sidebar = false;
            self.focus = FocusPane::Timeline;
        }
    }

    pub fn new_conversation(&mut self) {
        self.dispatch(Action::NewConversation);
        self.follow_bottom = true;
        self.sidebar_state.select(Some(0));
        self.show_sidebar = false;
        self.focus = FocusPane::Timeline;
        self.input_mode = InputMode::Editing;
    }

    /// Ask for confirmation before deleting; the active conversation is not offered.
    pub fn request_delete(&mut self) {
        let Some(id) = self.sidebar_selected_id() else {
            return;
        };
        if self.state.active_id() == Some(id.as_str()) {
            return;
        }
        self.confirm_delete = Some(id);
    }

    pub fn confirm_delete(&mut self) {
        if let Some(id) = self.confirm_delete.take() {
            self.dispatch(Action::DeleteConversation(id));
            let len = self.state.conversations().len();
            let i = self.sidebar_state.selected().unwrap_or(0).min(len.saturating_sub(1));
            self.sidebar_state.select(Some(i));
        }
    }

    pub fn cancel_delete(&mut self) {
        self.confirm_delete = None;
    }

    /// `0` resets, `1..=3` pick a colour preset, `4` picks glass.
    pub fn pick_background(&mut self, slot: char) {
        let background = match slot {
            '0' => Background::default(),
            '4' => Background::glass(),
            c => match c.to_digit(10).and_then(|d| BACKGROUND_COLORS.get((d as usize).wrapping_sub(1))) {
                Some(color) => Background::color(*color),
                None => return,
            },
        };
        self.dispatch(Action::SetBackground(background));
    }

    // Voice input

    pub fn toggle_listen(&mut self) {
        match self.speech_input.toggle_listen() {
            Some(ListenCommand::Start) => {
                self.clear_input();
                self.start_recognizer();
            }
            Some(ListenCommand::Stop) => self.stop_recognizer(),
            None => {}
        }
    }

    fn start_recognizer(&mut self) {
        let Some(argv) = self.recognizer_command.clone() else {
            return;
        };
        self.recognizer_session += 1;
        let session = self.recognizer_session;

        let (tx, mut rx) = mpsc::unbounded_channel();
        match RecognizerProcess::spawn(&argv, &self.speech_language, tx) {
            Ok(process) => {
                self.recognizer = Some(process);
                let events = self.events.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if events.send(AppEvent::Recognition { session, event }).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!("Failed to start speech recognizer: {}", e);
                self.speech_input
                    .on_event(&RecognitionEvent::Error { error: e.to_string() });
            }
        }
    }

    fn stop_recognizer(&mut self) {
        if let Some(process) = self.recognizer.take() {
            tracing::info!("Stopping speech recognizer");
            tokio::spawn(process.stop());
        }
    }

    pub fn on_recognition(&mut self, session: u64, event: RecognitionEvent) {
        if session != self.recognizer_session {
            return;
        }
        match self.speech_input.on_event(&event) {
            InputUpdate::Replace(text) => self.set_input(text),
            InputUpdate::Stopped => {
                self.recognizer = None;
            }
            InputUpdate::None => {}
        }
    }

    pub async fn shutdown(&mut self) {
        self.playback.clear();
        if let Some(process) = self.recognizer.take() {
            process.stop().await;
        }
    }

    /// Label used for a message author in the timeline.
    pub fn author(&self, role: ChatRole) -> &str {
        match role {
            ChatRole::User => "तुम",
            ChatRole::Model => self.state.persona().name(),
        }
    }
}
