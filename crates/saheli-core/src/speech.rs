//! Spoken output of messages: payload decoding and the speaking/loading markers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Result, SaheliError};

/// Short error shown when an utterance cannot be produced or played.
pub const SPEECH_ERROR: &str = "ऑडियो चलाने में असमर्थ।";

/// Convert little-endian signed 16-bit PCM into samples in [-1.0, 1.0].
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Decode a base64 speech payload into playback samples.
pub fn decode_speech_payload(payload: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| SaheliError::Speech(format!("invalid audio payload: {}", e)))?;
    let samples = decode_pcm16(&bytes);
    if samples.is_empty() {
        return Err(SaheliError::EmptyAudio);
    }
    Ok(samples)
}

/// What a speak toggle asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakCommand {
    /// A new utterance to synthesize, or `None` if the toggle meant "stop".
    pub request: Option<SpeechRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub utterance: u64,
    pub message_id: String,
    pub text: String,
}

/// Speaking and loading markers for the one utterance the client tracks.
///
/// Every stop or new request bumps the utterance number; late results or
/// completions tagged with an older number are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechOutput {
    speaking: Option<String>,
    loading: Option<String>,
    utterance: u64,
}

impl SpeechOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaking(&self) -> Option<&str> {
        self.speaking.as_deref()
    }

    pub fn loading(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    pub fn is_active(&self) -> bool {
        self.speaking.is_some() || self.loading.is_some()
    }

    /// The caller must stop any live playback before acting on the command.
    pub fn toggle(&mut self, message_id: &str, text: &str) -> SpeakCommand {
        let was_speaking = self.speaking.as_deref() == Some(message_id);
        self.stop();
        if was_speaking {
            return SpeakCommand { request: None };
        }

        self.speaking = Some(message_id.to_string());
        self.loading = Some(message_id.to_string());
        SpeakCommand {
            request: Some(SpeechRequest {
                utterance: self.utterance,
                message_id: message_id.to_string(),
                text: text.to_string(),
            }),
        }
    }

    /// Clear both markers and invalidate the current utterance.
    pub fn stop(&mut self) {
        self.speaking = None;
        self.loading = None;
        self.utterance += 1;
    }

    pub fn is_current(&self, utterance: u64) -> bool {
        utterance == self.utterance && self.speaking.is_some()
    }

    /// The synthesized payload arrived; decode it if it is still wanted.
    /// `Ok(None)` means the result is stale.
    pub fn audio_ready(&mut self, utterance: u64, payload: Option<&str>) -> Result<Option<Vec<f32>>> {
        if !self.is_current(utterance) {
            return Ok(None);
        }
        self.loading = None;
        let result = payload
            .ok_or(SaheliError::EmptyAudio)
            .and_then(decode_speech_payload);
        match result {
            Ok(samples) => Ok(Some(samples)),
            Err(e) => {
                self.speaking = None;
                Err(e)
            }
        }
    }

    /// A request or playback failed. Returns whether it concerned the current utterance.
    pub fn failed(&mut self, utterance: u64) -> bool {
        if utterance != self.utterance {
            return false;
        }
        self.speaking = None;
        self.loading = None;
        true
    }

    /// Natural end of playback.
    pub fn finished(&mut self, utterance: u64) {
        if self.is_current(utterance) {
            self.speaking = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_extremes() {
        let bytes = [0xFF, 0x7F, 0x00, 0x80];
        let samples = decode_pcm16(&bytes);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.99997).abs() < 1e-4);
        assert_eq!(samples[1], -1.0);
    }

    #[test]
    fn test_decode_ignores_trailing_byte() {
        assert_eq!(decode_pcm16(&[0x00, 0x00, 0x01]), vec![0.0]);
    }

    #[test]
    fn test_decode_payload_base64() {
        let payload = STANDARD.encode([0x00, 0x40]);
        assert_eq!(decode_speech_payload(&payload).unwrap(), vec![0.5]);
        assert!(matches!(decode_speech_payload(""), Err(SaheliError::EmptyAudio)));
        assert!(matches!(decode_speech_payload("!!"), Err(SaheliError::Speech(_))));
    }

    #[test]
    fn test_toggle_idle_then_same_message_stops() {
        let mut out = SpeechOutput::new();
        let cmd = out.toggle("m", "hello");
        let request = cmd.request.unwrap();
        assert_eq!(request.text, "hello");
        assert_eq!(out.speaking(), Some("m"));
        assert_eq!(out.loading(), Some("m"));

        let cmd = out.toggle("m", "hello");
        assert!(cmd.request.is_none());
        assert!(!out.is_active());
    }

    #[test]
    fn test_toggle_other_message_supersedes() {
        let mut out = SpeechOutput::new();
        let first = out.toggle("m", "one").request.unwrap();
        let second = out.toggle("n", "two").request.unwrap();
        assert_ne!(first.utterance, second.utterance);
        assert_eq!(out.speaking(), Some("n"));

        let payload = STANDARD.encode([0x00, 0x40]);
        assert_eq!(out.audio_ready(first.utterance, Some(&payload)).unwrap(), None);
        assert_eq!(out.loading(), Some("n"));
        assert!(out.audio_ready(second.utterance, Some(&payload)).unwrap().is_some());
        assert_eq!(out.loading(), None);
        assert_eq!(out.speaking(), Some("n"));
    }

    #[test]
    fn test_missing_payload_clears_markers() {
        let mut out = SpeechOutput::new();
        let req = out.toggle("m", "x").request.unwrap();
        assert!(out.audio_ready(req.utterance, None).is_err());
        assert!(!out.is_active());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut out = SpeechOutput::new();
        let first = out.toggle("m", "one").request.unwrap();
        let second = out.toggle("n", "two").request.unwrap();
        out.finished(first.utterance);
        assert_eq!(out.speaking(), Some("n"));
        out.finished(second.utterance);
        assert_eq!(out.speaking(), None);
    }

    #[test]
    fn test_failure_for_old_utterance_is_ignored() {
        let mut out = SpeechOutput::new();
        let first = out.toggle("m", "one").request.unwrap();
        out.toggle("n", "two");
        assert!(!out.failed(first.utterance));
        assert_eq!(out.speaking(), Some("n"));
    }
}
