pub mod gemini;
pub mod openai_compatible;
pub mod provider;
pub mod service;
pub mod types;

pub use provider::LlmProvider;
pub use service::LlmService;
pub use types::{ChatMessage, ChatRequest};
