//! OpenAI-compatible request serialization and stream parsing.
//!
//! Many endpoints (OpenAI, Ollama, vLLM, LiteLLM, etc.) accept the chat
//! completions request/stream shape. These helpers build the compat JSON body
//! and decode its `data:` payloads into [`LLMChunk`]s.

use agent_core::{
    tools::{FunctionCall, ToolCall, ToolSchema},
    Message,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::Result;
use crate::types::{FinishReason, LLMChunk, TokenUsage};

/// Convert internal [`Message`] values to an OpenAI-compatible JSON array.
pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": m.role.as_str(),
                "content": m.content,
            });

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls);
            }

            msg
        })
        .collect()
}

/// Convert internal [`ToolSchema`] values to the OpenAI `tools` array JSON.
pub fn tools_to_openai_compat_json(tools: &[ToolSchema]) -> Vec<Value> {
    tools.iter().map(|t| json!(t)).collect()
}

/// Build a standard OpenAI-compatible streaming chat request body.
///
/// `tools` is omitted entirely when empty; several compat servers reject an
/// empty array.
pub fn build_openai_compat_body(
    model: &str,
    messages: &[Message],
    tools: &[ToolSchema],
    max_output_tokens: Option<u32>,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": true,
    });

    if !tools.is_empty() {
        body["tools"] = json!(tools_to_openai_compat_json(tools));
    }

    if let Some(max_tokens) = max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

// --- OpenAI-compatible streaming chunk parsing ---

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
    usage: Option<OpenAICompatUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAICompatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCallDelta {
    id: Option<String>,
    #[serde(rename = "type")]
    tool_type: Option<String>,
    function: Option<OpenAICompatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Convert a single OpenAI-compatible stream chunk into [`LLMChunk`]s.
///
/// Tool calls come out as raw fragments; later fragments of the same call
/// carry neither id nor name.
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> Vec<LLMChunk> {
    let mut out = Vec::new();

    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                out.push(LLMChunk::Token(content));
            }
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            let calls: Vec<ToolCall> = tool_calls
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name.unwrap_or_default(), f.arguments.unwrap_or_default()),
                        None => (String::new(), String::new()),
                    };
                    ToolCall {
                        id: tc.id.unwrap_or_default(),
                        tool_type: tc.tool_type.unwrap_or_default(),
                        function: FunctionCall { name, arguments },
                    }
                })
                .collect();

            if !calls.is_empty() {
                out.push(LLMChunk::ToolCalls(calls));
            }
        }

        if let Some(reason) = choice.finish_reason {
            out.push(LLMChunk::Finish(FinishReason::from_openai(&reason)));
        }
    }

    if let Some(usage) = chunk.usage {
        out.push(LLMChunk::Usage(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }));
    }

    out
}

/// Parse an SSE `data:` payload.
///
/// - `"[DONE]"` -> `LLMChunk::Done`
/// - Invalid JSON -> error
pub fn parse_openai_compat_sse_data(data: &str) -> Result<Vec<LLMChunk>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(vec![]);
    }
    if data == "[DONE]" {
        return Ok(vec![LLMChunk::Done]);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tools::ToolCallAccumulator;

    #[test]
    fn messages_include_tool_fields() {
        let tool_call = ToolCall {
            id: "call_1".to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: "search".to_string(),
                arguments: r#"{"q":"test"}"#.to_string(),
            },
        };

        let messages = vec![
            Message::system("You are helpful"),
            Message::assistant("", Some(vec![tool_call])),
            Message::tool_result("call_1", "ok"),
        ];

        let out = messages_to_openai_compat_json(&messages);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["role"], "system");
        assert_eq!(out[1]["role"], "assistant");
        assert_eq!(out[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(out[1]["tool_calls"][0]["type"], "function");
        assert_eq!(out[1]["tool_calls"][0]["function"]["arguments"], r#"{"q":"test"}"#);
        assert_eq!(out[2]["role"], "tool");
        assert_eq!(out[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn body_omits_empty_tools() {
        let messages = vec![Message::user("Hello")];

        let body = build_openai_compat_body("gpt-4o-mini", &messages, &[], None);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn body_with_tools_and_max_tokens() {
        let tools = vec![ToolSchema::function(
            "search",
            "Search the web",
            json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        )];

        let body =
            build_openai_compat_body("gpt-4", &[Message::user("Hello")], &tools, Some(4096));

        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["tools"][0]["type"], "function");
        assert!(body["tools"][0].get("schema_type").is_none());
        assert_eq!(body["tools"][0]["function"]["name"], "search");
    }

    #[test]
    fn content_delta_yields_token() {
        let data = r#"{"id":"chatcmpl_1","choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_openai_compat_sse_data(data).unwrap(),
            vec![LLMChunk::Token("Hello".to_string())]
        );
    }

    #[test]
    fn empty_delta_yields_nothing() {
        let data = r#"{"id":"chatcmpl_1","choices":[{"delta":{}}]}"#;
        assert!(parse_openai_compat_sse_data(data).unwrap().is_empty());
        assert!(parse_openai_compat_sse_data(r#"{"choices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn done_and_invalid_json() {
        assert_eq!(
            parse_openai_compat_sse_data("  [DONE]  ").unwrap(),
            vec![LLMChunk::Done]
        );
        assert!(parse_openai_compat_sse_data("{invalid json}").is_err());
    }

    #[test]
    fn finish_reason_and_usage() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#;
        assert_eq!(
            parse_openai_compat_sse_data(data).unwrap(),
            vec![
                LLMChunk::Finish(FinishReason::ToolCalls),
                LLMChunk::Usage(TokenUsage {
                    prompt_tokens: 12,
                    completion_tokens: 3
                }),
            ]
        );
    }

    #[test]
    fn tool_call_fragments_accumulate() {
        let frames = [
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"add_todo","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"title\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"milk\"}"}}]}}]}"#,
        ];

        let mut accumulator = ToolCallAccumulator::new();
        for frame in frames {
            for chunk in parse_openai_compat_sse_data(frame).unwrap() {
                if let LLMChunk::ToolCalls(calls) = chunk {
                    accumulator.extend(calls);
                }
            }
        }

        let calls = accumulator.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "add_todo");
        assert_eq!(calls[0].function.arguments, r#"{"title":"milk"}"#);
    }
}
