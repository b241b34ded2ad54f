pub mod gemini;
pub mod sse;

pub use gemini::{ChatStream, GeminiClient};
