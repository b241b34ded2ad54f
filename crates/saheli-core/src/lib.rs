pub mod ai;
pub mod assembler;
pub mod config;
pub mod error;
pub mod persona;
pub mod playback;
pub mod recognizer;
pub mod reducer;
pub mod session;
pub mod speech;
pub mod speech_input;
pub mod state;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use ai::{ChatStream, GeminiClient};
pub use config::Config;
pub use error::{Result, SaheliError};
pub use persona::Persona;
pub use playback::{AudioOutput, PlaybackHandle, PlaybackSlot};
pub use reducer::{Action, AppState, Effect};
pub use state::{Background, ChatMessage, ChatRole, Conversation};
pub use storage::{FileStore, Persistence};
