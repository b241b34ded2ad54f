use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use futures_util::stream::BoxStream;
use std::collections::VecDeque;

use crate::config::Config;
use crate::error::{Result, SaheliError};
use crate::session::{ChatRequest, Turn};
use super::sse::SseDecoder;

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChatRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechGenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSpeechRequest {
    contents: Vec<GeminiContent>,
    generation_config: SpeechGenerationConfig,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Default)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }
}

/// Text carried by one streamed chunk (all text parts of the first candidate).
fn chunk_text(payload: &str) -> Result<String> {
    let response: GeminiResponse = serde_json::from_str(payload)?;
    Ok(response
        .first_parts()
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect())
}

/// Base64 audio of a speech response, if any.
fn speech_payload(response: &GeminiResponse) -> Option<String> {
    response
        .first_parts()
        .first()
        .and_then(|p| p.inline_data.as_ref())
        .map(|d| d.data.clone())
        .filter(|d| !d.is_empty())
}

fn text_content(role: Option<&str>, text: &str) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart {
            text: text.to_string(),
        }],
    }
}

fn history_content(turn: &Turn) -> GeminiContent {
    text_content(Some(turn.role.as_str()), &turn.text)
}

/// Fragments of one streamed reply, in arrival order.
pub struct ChatStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl ChatStream {
    /// Next non-empty fragment, `None` at the end of the stream.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                match chunk_text(&payload) {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => return Some(Err(e)),
                }
            }
            if self.done {
                return None;
            }
            match self.body.next().await {
                Some(Ok(bytes)) => {
                    self.pending.extend(self.decoder.push(&bytes));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(SaheliError::ChatStream(e.to_string())));
                }
                None => {
                    self.done = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    tts_model: String,
    voice_name: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            tts_model: config.tts_model.clone(),
            voice_name: config.voice_name.clone(),
        }
    }

    /// Build a client from configuration; fails when no credential is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| SaheliError::ClientInit("no Gemini API key configured".to_string()))?;
        Ok(Self::new(&api_key, config))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream> {
        let mut contents: Vec<GeminiContent> = request.history.iter().map(history_content).collect();
        contents.push(text_content(Some("user"), &request.message));

        let body = GeminiChatRequest {
            contents,
            system_instruction: text_content(None, &request.system_instruction),
        };

        let response = self.client
            .post(format!("{}?alt=sse", self.model_url(&self.chat_model, "streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SaheliError::ChatStream(format!("Gemini API error {}: {}", status, text)));
        }

        Ok(ChatStream {
            body: response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    /// Synthesize `text` with the configured voice. `Ok(None)` when the
    /// response carries no audio.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Option<String>> {
        let body = GeminiSpeechRequest {
            contents: vec![text_content(None, text)],
            generation_config: SpeechGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice_name.clone(),
                        },
                    },
                },
            },
        };

        let response = self.client
            .post(self.model_url(&self.tts_model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SaheliError::Speech(format!("Gemini API error {}: {}", status, text)));
        }

        let speech_response: GeminiResponse = response.json().await?;
        Ok(speech_payload(&speech_response))
    }
}
