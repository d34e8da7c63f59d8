//! Google Gemini protocol conversion.
//!
//! Gemini API has its own format:
//! - Messages are called "contents"
//! - Role is "user" or "model" (not "assistant")
//! - Content is an array of "parts"
//! - System instructions are separate from messages
//! - Function calls carry no id, so tool results are matched by name
//!
//! # Example Gemini Request
//! ```json
//! {
//!   "contents": [
//!     {
//!       "role": "user",
//!       "parts": [{"text": "Hello"}]
//!     }
//!   ],
//!   "systemInstruction": {
//!     "parts": [{"text": "You are helpful"}]
//!   },
//!   "tools": [...]
//! }
//! ```

use crate::protocol::{FromProvider, ProtocolError, ProtocolResult, ToProvider};
use agent_core::tools::{FunctionCall, ToolCall, ToolSchema};
use agent_core::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Gemini API Types
// ============================================================================

/// Gemini request format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation history
    pub contents: Vec<GeminiContent>,
    /// System instructions (extracted from system messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Available tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    /// Generation config (temperature, max_tokens, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
}

/// Gemini message/content format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    /// "user" or "model" (not "assistant")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Gemini content part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Function call (for model responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    /// Function response (for tool results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

/// Gemini tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// Gemini function declaration (tool schema)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// One `streamGenerateContent` SSE payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiStreamResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

// ============================================================================
// Gemini → Internal (FromProvider)
// ============================================================================

impl FromProvider<GeminiFunctionCall> for ToolCall {
    fn from_provider(call: GeminiFunctionCall) -> ProtocolResult<Self> {
        if call.name.is_empty() {
            return Err(ProtocolError::InvalidToolCall(
                "function call without a name".to_string(),
            ));
        }

        let args = if call.args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            call.args
        };

        Ok(ToolCall {
            // Gemini doesn't have IDs
            id: format!("gemini_{}", uuid::Uuid::new_v4().simple()),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: call.name,
                arguments: serde_json::to_string(&args)?,
            },
        })
    }
}

// ============================================================================
// Internal → Gemini (ToProvider)
// ============================================================================

impl ToProvider<GeminiRequest> for Vec<Message> {
    fn to_provider(&self) -> ProtocolResult<GeminiRequest> {
        let mut system_parts = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();
        // Tool results are keyed by call id, Gemini wants the function name.
        let mut call_names: HashMap<&str, &str> = HashMap::new();

        for msg in self {
            match msg.role {
                Role::System => system_parts.push(GeminiPart::text(msg.content.clone())),
                Role::Tool => {
                    let call_id = msg
                        .tool_call_id
                        .as_deref()
                        .ok_or_else(|| ProtocolError::MissingField("tool_call_id".to_string()))?;
                    let name = call_names.get(call_id).copied().unwrap_or(call_id);

                    let part = GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            name: name.to_string(),
                            response: function_response_body(name, &msg.content),
                        }),
                        ..Default::default()
                    };

                    // Parallel calls are answered in a single turn.
                    match contents.last_mut() {
                        Some(last) if last.role == "user" && is_function_turn(last) => {
                            last.parts.push(part)
                        }
                        _ => contents.push(GeminiContent {
                            role: "user".to_string(),
                            parts: vec![part],
                        }),
                    }
                }
                _ => {
                    if let Some(calls) = &msg.tool_calls {
                        for call in calls {
                            call_names.insert(call.id.as_str(), call.function.name.as_str());
                        }
                    }
                    contents.push(msg.to_provider()?);
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: String::new(),
                parts: system_parts,
            })
        };

        Ok(GeminiRequest {
            contents,
            system_instruction,
            tools: None,
            generation_config: None,
        })
    }
}

fn is_function_turn(content: &GeminiContent) -> bool {
    content
        .parts
        .iter()
        .all(|part| part.function_response.is_some())
}

/// Gemini expects an object; plain text results are wrapped.
fn function_response_body(name: &str, content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ Value::Object(_)) => value,
        _ => serde_json::json!({ "name": name, "content": content }),
    }
}

impl ToProvider<GeminiContent> for Message {
    fn to_provider(&self) -> ProtocolResult<GeminiContent> {
        let role = match self.role {
            Role::User => "user",
            Role::Assistant => "model",
            Role::System | Role::Tool => {
                return Err(ProtocolError::InvalidRole(self.role.as_str().to_string()))
            }
        };

        let mut parts = Vec::new();

        if !self.content.is_empty() {
            parts.push(GeminiPart::text(self.content.clone()));
        }

        if let Some(tool_calls) = &self.tool_calls {
            for tc in tool_calls {
                let args: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

                parts.push(GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        name: tc.function.name.clone(),
                        args,
                    }),
                    ..Default::default()
                });
            }
        }

        // Ensure at least one part
        if parts.is_empty() {
            parts.push(GeminiPart::text(String::new()));
        }

        Ok(GeminiContent {
            role: role.to_string(),
            parts,
        })
    }
}

impl ToProvider<Vec<GeminiTool>> for Vec<ToolSchema> {
    fn to_provider(&self) -> ProtocolResult<Vec<GeminiTool>> {
        // Gemini groups all function declarations into a single tool
        let declarations: Vec<GeminiFunctionDeclaration> = self
            .iter()
            .map(|schema| GeminiFunctionDeclaration {
                name: schema.function.name.clone(),
                description: if schema.function.description.is_empty() {
                    None
                } else {
                    Some(schema.function.description.clone())
                },
                parameters: schema.function.parameters.clone(),
            })
            .collect();

        if declarations.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![GeminiTool {
                function_declarations: declarations,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: args.to_string(),
            },
        }
    }

    #[test]
    fn system_messages_become_instruction() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::system("Be brief"),
            Message::user("Hello"),
        ];

        let request: GeminiRequest = messages.to_provider().unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["systemInstruction"]["parts"][1]["text"], "Be brief");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn assistant_becomes_model_with_function_calls() {
        let messages = vec![Message::assistant(
            "Checking",
            Some(vec![call("c1", "list_todos", r#"{"done":false}"#)]),
        )];

        let request: GeminiRequest = messages.to_provider().unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "model");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Checking");
        assert_eq!(
            value["contents"][0]["parts"][1]["functionCall"]["args"],
            json!({"done": false})
        );
    }

    #[test]
    fn tool_results_are_named_after_their_call() {
        let messages = vec![
            Message::user("What do I have to do?"),
            Message::assistant(
                "",
                Some(vec![
                    call("c1", "list_todos", "{}"),
                    call("c2", "get_time", "{}"),
                ]),
            ),
            Message::tool_result("c1", "1. buy milk"),
            Message::tool_result("c2", r#"{"time":"09:00"}"#),
        ];

        let request: GeminiRequest = messages.to_provider().unwrap();
        let value = serde_json::to_value(&request).unwrap();

        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        let responses = &contents[2]["parts"];
        assert_eq!(responses[0]["functionResponse"]["name"], "list_todos");
        assert_eq!(
            responses[0]["functionResponse"]["response"]["content"],
            "1. buy milk"
        );
        assert_eq!(responses[1]["functionResponse"]["name"], "get_time");
        assert_eq!(responses[1]["functionResponse"]["response"]["time"], "09:00");
    }

    #[test]
    fn tool_result_without_call_id_is_rejected() {
        let mut message = Message::tool_result("c1", "x");
        message.tool_call_id = None;

        let result: ProtocolResult<GeminiRequest> = vec![message].to_provider();
        assert!(matches!(result, Err(ProtocolError::MissingField(_))));
    }

    #[test]
    fn tools_grouped_into_one_declaration_list() {
        let tools = vec![
            ToolSchema::function("list_todos", "List todos", json!({"type": "object"})),
            ToolSchema::function("add_todo", "", json!({"type": "object"})),
        ];

        let gemini: Vec<GeminiTool> = tools.to_provider().unwrap();
        let value = serde_json::to_value(&gemini).unwrap();

        assert_eq!(gemini.len(), 1);
        assert_eq!(value[0]["functionDeclarations"].as_array().unwrap().len(), 2);
        assert!(value[0]["functionDeclarations"][1].get("description").is_none());
    }

    #[test]
    fn function_call_gets_generated_id() {
        let call = ToolCall::from_provider(GeminiFunctionCall {
            name: "list_todos".to_string(),
            args: Value::Null,
        })
        .unwrap();

        assert!(call.id.starts_with("gemini_"));
        assert_eq!(call.function.arguments, "{}");
    }
}
