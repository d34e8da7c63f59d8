//! Gemini SSE stream parser.
//!
//! With `alt=sse` Gemini sends one JSON object per `data:` line:
//! ```text
//! data: {"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}
//!
//! data: {"candidates":[{"content":{"parts":[{"functionCall":{"name":"search","args":{"q":"test"}}}],"role":"model"},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":9,"candidatesTokenCount":4}}
//! ```
//! There is no `[DONE]` sentinel; the stream simply ends.

use crate::protocol::gemini::GeminiStreamResponse;
use crate::protocol::FromProvider;
use crate::provider::{LLMError, Result};
use crate::types::{FinishReason, LLMChunk, TokenUsage};
use agent_core::tools::ToolCall;
use serde_json::Value;

/// Parse a single Gemini SSE event into the chunks it carries.
///
/// Every part of the first candidate is decoded, so a frame holding text and
/// a function call yields both.
pub fn parse_gemini_sse_event(_event_type: &str, data: &str) -> Result<Vec<LLMChunk>> {
    let data = data.trim();

    if data.is_empty() {
        return Ok(vec![]);
    }

    if data == "[DONE]" {
        return Ok(vec![LLMChunk::Done]);
    }

    let value: Value = serde_json::from_str(data).map_err(|e| {
        LLMError::Stream(format!("Failed to parse Gemini SSE data: {}: {}", e, data))
    })?;

    if let Some(error) = value.get("error") {
        let error_msg = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown Gemini API error");
        return Err(LLMError::Api(error_msg.to_string()));
    }

    let response: GeminiStreamResponse = serde_json::from_value(value)?;
    let mut chunks = Vec::new();

    if let Some(candidate) = response.candidates.into_iter().next() {
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut calls: Vec<ToolCall> = Vec::new();
        for part in parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    chunks.push(LLMChunk::Token(text));
                }
            }
            if let Some(function_call) = part.function_call {
                calls.push(ToolCall::from_provider(function_call)?);
            }
        }
        if !calls.is_empty() {
            chunks.push(LLMChunk::ToolCalls(calls));
        }

        if let Some(reason) = candidate.finish_reason {
            chunks.push(LLMChunk::Finish(FinishReason::from_gemini(&reason)));
        }
    }

    if let Some(usage) = response.usage_metadata {
        chunks.push(LLMChunk::Usage(TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        }));
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#;

        let chunks = parse_gemini_sse_event("", data).unwrap();
        assert_eq!(chunks, vec![LLMChunk::Token("Hello".to_string())]);
    }

    #[test]
    fn parse_empty_data_and_done() {
        assert!(parse_gemini_sse_event("", "").unwrap().is_empty());
        assert_eq!(
            parse_gemini_sse_event("", "   [DONE]   ").unwrap(),
            vec![LLMChunk::Done]
        );
    }

    #[test]
    fn parse_function_call() {
        let data = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"search","args":{"q":"test"}}}],"role":"model"}}]}"#;

        let chunks = parse_gemini_sse_event("", data).unwrap();

        match &chunks[0] {
            LLMChunk::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "search");
                assert_eq!(calls[0].function.arguments, r#"{"q":"test"}"#);
                assert!(calls[0].id.starts_with("gemini_"));
            }
            other => panic!("expected LLMChunk::ToolCalls, got {:?}", other),
        }
    }

    #[test]
    fn parse_all_parts_finish_and_usage() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Let me check. "},{"functionCall":{"name":"list_todos","args":{}}},{"functionCall":{"name":"get_time"}}],"role":"model"},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":9,"candidatesTokenCount":4,"totalTokenCount":13}}"#;

        let chunks = parse_gemini_sse_event("", data).unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], LLMChunk::Token("Let me check. ".to_string()));
        match &chunks[1] {
            LLMChunk::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_ne!(calls[0].id, calls[1].id);
                assert_eq!(calls[1].function.arguments, "{}");
            }
            other => panic!("expected LLMChunk::ToolCalls, got {:?}", other),
        }
        assert_eq!(chunks[2], LLMChunk::Finish(FinishReason::Stop));
        assert_eq!(
            chunks[3],
            LLMChunk::Usage(TokenUsage {
                prompt_tokens: 9,
                completion_tokens: 4
            })
        );
    }

    #[test]
    fn parse_empty_candidates_and_missing_content() {
        assert!(parse_gemini_sse_event("", r#"{"candidates":[]}"#)
            .unwrap()
            .is_empty());

        let chunks = parse_gemini_sse_event("", r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#)
            .unwrap();
        assert_eq!(chunks, vec![LLMChunk::Finish(FinishReason::Length)]);
    }

    #[test]
    fn parse_error_response() {
        let data = r#"{"error":{"message":"API key invalid","code":401}}"#;

        let err = parse_gemini_sse_event("", data).unwrap_err();
        assert!(err.to_string().contains("API key invalid"));
    }

    #[test]
    fn parse_invalid_json() {
        assert!(parse_gemini_sse_event("", "{invalid json}").is_err());
    }
}
