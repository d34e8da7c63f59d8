use agent_core::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// One decoded unit of a provider's streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    /// Complete calls or fragments to be merged by a `ToolCallAccumulator`.
    ToolCalls(Vec<ToolCall>),
    Usage(TokenUsage),
    Finish(FinishReason),
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Why a generation step stopped, in data-stream wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason`.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            _ => FinishReason::Other,
        }
    }

    /// Map a Gemini `finishReason`.
    pub fn from_gemini(reason: &str) -> Self {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                FinishReason::ContentFilter
            }
            "FINISH_REASON_UNSPECIFIED" => FinishReason::Unknown,
            _ => FinishReason::Other,
        }
    }
}
