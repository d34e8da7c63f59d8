//! Data stream wire encoding.
//!
//! Each [`StreamPart`] becomes one `<code>:<json>\n` line, the framing chat
//! front-ends built on the AI SDK `useChat` hook read incrementally.

use serde_json::{json, Value};

use crate::invoker::StreamPart;

pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";
pub const DATA_STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

fn line(code: char, payload: Value) -> String {
    format!("{}:{}\n", code, payload)
}

/// Encode one part as a complete line, newline included.
pub fn encode_part(part: &StreamPart) -> String {
    match part {
        StreamPart::StartStep { message_id } => line('f', json!({ "messageId": message_id })),
        StreamPart::TextDelta(text) => line('0', json!(text)),
        StreamPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
        } => line(
            '9',
            json!({
                "toolCallId": tool_call_id,
                "toolName": tool_name,
                "args": args,
            }),
        ),
        StreamPart::ToolResult {
            tool_call_id,
            result,
        } => line(
            'a',
            json!({
                "toolCallId": tool_call_id,
                "result": result,
            }),
        ),
        StreamPart::FinishStep {
            finish_reason,
            usage,
            is_continued,
        } => line(
            'e',
            json!({
                "finishReason": finish_reason,
                "usage": usage,
                "isContinued": is_continued,
            }),
        ),
        StreamPart::Finish {
            finish_reason,
            usage,
        } => line(
            'd',
            json!({
                "finishReason": finish_reason,
                "usage": usage,
            }),
        ),
        StreamPart::Error(message) => line('3', json!(message)),
    }
}
