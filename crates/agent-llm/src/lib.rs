//! Streaming LLM providers and the generation engine of the chat bridge.

pub mod data_stream;
pub mod invoker;
pub mod protocol;
pub mod provider;
pub mod provider_factory;
pub mod providers;
pub mod types;

pub use invoker::{
    CompletionStatus, GenerationInvoker, GenerationStream, InvokerConfig, OnComplete, StreamPart,
};
pub use provider::{LLMError, LLMProvider, LLMStream};
pub use provider_factory::{create_provider, ProviderSettings, AVAILABLE_PROVIDERS};
pub use providers::{GeminiProvider, OpenAIProvider};
pub use types::{FinishReason, LLMChunk, TokenUsage};
