//! Voice input: turns recognizer events into the text shown in the input field.

use serde::Deserialize;

/// Placeholder shown in the input field while listening.
pub const LISTENING_PLACEHOLDER: &str = "हाँ हाँ, सुन रही हूँ...";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub transcript: String,
    #[serde(default)]
    pub is_final: bool,
}

/// Events emitted by a speech recognizer, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecognitionEvent {
    #[serde(rename_all = "camelCase")]
    Result {
        #[serde(default)]
        result_index: usize,
        results: Vec<TranscriptSegment>,
    },
    End,
    Error {
        error: String,
    },
}

impl RecognitionEvent {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenCommand {
    Start,
    Stop,
}

/// What the input field should do after a recognizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputUpdate {
    /// Replace the whole field with this text.
    Replace(String),
    /// Listening ended; the field keeps its text.
    Stopped,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct SpeechInput {
    available: bool,
    listening: bool,
}

impl SpeechInput {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            listening: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// `Start` means the caller clears the input and launches the recognizer.
    pub fn toggle_listen(&mut self) -> Option<ListenCommand> {
        if !self.available {
            return None;
        }
        if self.listening {
            Some(ListenCommand::Stop)
        } else {
            self.listening = true;
            Some(ListenCommand::Start)
        }
    }

    /// Called before a submit; listening stops first, the text stays.
    pub fn submit(&mut self) -> Option<ListenCommand> {
        if self.listening {
            self.listening = false;
            Some(ListenCommand::Stop)
        } else {
            None
        }
    }

    pub fn on_event(&mut self, event: &RecognitionEvent) -> InputUpdate {
        match event {
            RecognitionEvent::Result { result_index, results } => {
                if !self.listening {
                    return InputUpdate::None;
                }
                InputUpdate::Replace(assemble_transcript(*result_index, results))
            }
            RecognitionEvent::End => {
                self.listening = false;
                InputUpdate::Stopped
            }
            RecognitionEvent::Error { error } => {
                tracing::warn!("Speech recognition error: {}", error);
                self.listening = false;
                InputUpdate::Stopped
            }
        }
    }
}

/// Final segments first, then interim ones, from `result_index` onward.
pub fn assemble_transcript(result_index: usize, results: &[TranscriptSegment]) -> String {
    let mut finals = String::new();
    let mut interim = String::new();
    for segment in results.iter().skip(result_index) {
        if segment.is_final {
            finals.push_str(&segment.transcript);
        } else {
            interim.push_str(&segment.transcript);
        }
    }
    finals + &interim
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, is_final: bool) -> TranscriptSegment {
        TranscriptSegment {
            transcript: text.to_string(),
            is_final,
        }
    }

    #[test]
    fn test_finals_before_interim() {
        let results = vec![seg("कैसी ", false), seg("नमस्ते ", true), seg("हो", false)];
        assert_eq!(assemble_transcript(0, &results), "नमस्ते कैसी हो");
        assert_eq!(assemble_transcript(1, &results), "नमस्ते हो");
    }

    #[test]
    fn test_parse_event_lines() {
        let event = RecognitionEvent::parse(
            r#"{"type":"result","resultIndex":0,"results":[{"transcript":"hi","isFinal":true}]}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            RecognitionEvent::Result {
                result_index: 0,
                results: vec![seg("hi", true)]
            }
        );
        assert_eq!(RecognitionEvent::parse(r#"{"type":"end"}"#), Some(RecognitionEvent::End));
        assert_eq!(
            RecognitionEvent::parse(r#"{"type":"error","error":"no-speech"}"#),
            Some(RecognitionEvent::Error { error: "no-speech".to_string() })
        );
        assert_eq!(RecognitionEvent::parse("garbage"), None);
    }

    #[test]
    fn test_results_replace_not_append() {
        let mut input = SpeechInput::new(true);
        assert_eq!(input.toggle_listen(), Some(ListenCommand::Start));
        let first = RecognitionEvent::Result { result_index: 0, results: vec![seg("नम", false)] };
        let second = RecognitionEvent::Result { result_index: 0, results: vec![seg("नमस्ते", true)] };
        assert_eq!(input.on_event(&first), InputUpdate::Replace("नम".to_string()));
        assert_eq!(input.on_event(&second), InputUpdate::Replace("नमस्ते".to_string()));
    }

    #[test]
    fn test_end_and_error_clear_listening() {
        let mut input = SpeechInput::new(true);
        input.toggle_listen();
        assert_eq!(input.on_event(&RecognitionEvent::End), InputUpdate::Stopped);
        assert!(!input.is_listening());

        input.toggle_listen();
        let err = RecognitionEvent::Error { error: "network".to_string() };
        assert_eq!(input.on_event(&err), InputUpdate::Stopped);
        assert!(!input.is_listening());
    }

    #[test]
    fn test_unavailable_never_listens() {
        let mut input = SpeechInput::new(false);
        assert_eq!(input.toggle_listen(), None);
        assert!(!input.is_listening());
    }

    #[test]
    fn test_submit_while_listening_stops_first() {
        let mut input = SpeechInput::new(true);
        input.toggle_listen();
        assert_eq!(input.submit(), Some(ListenCommand::Stop));
        assert!(!input.is_listening());
        assert_eq!(input.submit(), None);
    }

    #[test]
    fn test_toggle_while_listening_requests_stop() {
        let mut input = SpeechInput::new(true);
        input.toggle_listen();
        assert_eq!(input.toggle_listen(), Some(ListenCommand::Stop));
        // listening clears when the recognizer reports its end
        assert!(input.is_listening());
        input.on_event(&RecognitionEvent::End);
        assert!(!input.is_listening());
    }
}
