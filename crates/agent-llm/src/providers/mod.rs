//! LLM Providers
//!
//! Streaming chat providers the bridge can generate with.

pub(crate) mod common;
pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
