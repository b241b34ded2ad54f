//! Error types for the chat core.

/// Errors raised by the chat core and its service clients.
#[derive(Debug, thiserror::Error)]
pub enum SaheliError {
    #[error("client initialization failed: {0}")]
    ClientInit(String),
    #[error("chat stream failed: {0}")]
    ChatStream(String),
    #[error("speech synthesis failed: {0}")]
    Speech(String),
    #[error("no audio data received")]
    EmptyAudio,
    #[error("speech recognition failed: {0}")]
    Recognition(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SaheliError>;
