use crate::agent::{ChatRequest, Message, Role};
use crate::tools::{FunctionCall, ToolCall, ToolSchema};

#[test]
fn test_message_creation() {
    let msg = Message::user("Hello");
    assert_eq!(msg.content, "Hello");
    assert_eq!(msg.role, Role::User);
    assert!(msg.tool_calls.is_none());
}

#[test]
fn test_chat_request_plain_string_content() {
    let json = r#"{
        "messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "list my todos"}
        ]
    }"#;

    let request: ChatRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[1].content, "list my todos");
}

#[test]
fn test_chat_request_parts_content_and_unknown_fields() {
    let json = r#"{
        "id": "chat-1",
        "messages": [
            {
                "id": "m1",
                "createdAt": "2025-01-01T00:00:00Z",
                "role": "user",
                "content": [
                    {"type": "text", "text": "hello "},
                    {"type": "image", "image": "ignored"},
                    {"type": "text", "text": "there"}
                ]
            }
        ]
    }"#;

    let request: ChatRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.messages[0].content, "hello there");
}

#[test]
fn test_chat_request_rejects_unknown_role() {
    let json = r#"{"messages": [{"role": "robot", "content": "beep"}]}"#;
    assert!(serde_json::from_str::<ChatRequest>(json).is_err());
}

#[test]
fn test_message_serialization_omits_empty_tool_fields() {
    let value = serde_json::to_value(Message::assistant("hi", None)).unwrap();
    assert_eq!(value, serde_json::json!({"role": "assistant", "content": "hi"}));
}

#[test]
fn test_tool_call_wire_shape() {
    let call = ToolCall {
        id: "call-1".to_string(),
        tool_type: "function".to_string(),
        function: FunctionCall {
            name: "add_todo".to_string(),
            arguments: r#"{"title": "x"}"#.to_string(),
        },
    };

    let value = serde_json::to_value(&call).unwrap();
    assert_eq!(value["type"], "function");
    assert_eq!(value["function"]["name"], "add_todo");
}

#[test]
fn test_tool_schema_function_constructor() {
    let schema = ToolSchema::function("list_todos", "List todos", serde_json::json!({}));
    assert_eq!(schema.schema_type, "function");
    assert_eq!(schema.function.name, "list_todos");
}
