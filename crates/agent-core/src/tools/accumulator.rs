use uuid::Uuid;

use crate::tools::{FunctionCall, ToolCall};

/// A tool call that may still be receiving argument fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: String,
    pub tool_type: String,
    pub name: String,
    pub arguments: String,
}

/// Merges streamed tool-call fragments into complete calls.
///
/// Providers differ in how they split a call across chunks: some repeat the
/// id on every fragment, others send the id and name once and then only
/// argument text.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    parts: Vec<PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, call: ToolCall) {
        let ToolCall {
            id,
            tool_type,
            function: FunctionCall { name, arguments },
        } = call;

        if id.is_empty() && name.is_empty() {
            if arguments.is_empty() {
                return;
            }
            match self.parts.last_mut() {
                Some(last) => last.arguments.push_str(&arguments),
                None => self.parts.push(PartialToolCall {
                    id,
                    tool_type,
                    name,
                    arguments,
                }),
            }
            return;
        }

        let existing = if !id.is_empty() {
            self.parts.iter_mut().find(|part| part.id == id)
        } else {
            self.parts
                .iter_mut()
                .find(|part| part.id.is_empty() && (part.name == name || part.name.is_empty()))
        };

        match existing {
            Some(part) => {
                part.arguments.push_str(&arguments);
                if !name.is_empty() {
                    part.name = name;
                }
                if !tool_type.is_empty() {
                    part.tool_type = tool_type;
                }
            }
            None => self.parts.push(PartialToolCall {
                id,
                tool_type,
                name,
                arguments,
            }),
        }
    }

    pub fn extend<I>(&mut self, calls: I)
    where
        I: IntoIterator<Item = ToolCall>,
    {
        for call in calls {
            self.update(call);
        }
    }

    pub fn finalize(self) -> Vec<ToolCall> {
        finalize_tool_calls(self.parts)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Drop nameless fragments and fill in missing ids and types.
pub fn finalize_tool_calls(parts: Vec<PartialToolCall>) -> Vec<ToolCall> {
    parts
        .into_iter()
        .filter(|part| !part.name.trim().is_empty())
        .map(|part| ToolCall {
            id: if part.id.is_empty() {
                format!("call_{}", Uuid::new_v4())
            } else {
                part.id
            },
            tool_type: if part.tool_type.is_empty() {
                "function".to_string()
            } else {
                part.tool_type
            },
            function: FunctionCall {
                name: part.name,
                arguments: part.arguments,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn accumulator_merges_partial_arguments() {
        let mut accumulator = ToolCallAccumulator::new();

        accumulator.update(make_tool_call("call_1", "add_todo", "{\"title\": \""));
        accumulator.update(make_tool_call("call_1", "", "buy milk"));
        accumulator.update(make_tool_call("call_1", "", "\"}"));

        let calls = accumulator.finalize();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "add_todo");
        assert_eq!(calls[0].function.arguments, "{\"title\": \"buy milk\"}");
    }

    #[test]
    fn argument_only_fragment_extends_last_call() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.update(make_tool_call("call_1", "list_todos", "{\"a\":"));
        accumulator.update(make_tool_call("", "", "1}"));

        let calls = accumulator.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, "{\"a\":1}");
    }

    #[test]
    fn separate_ids_stay_separate() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.extend(vec![
            make_tool_call("call_1", "list_todos", "{}"),
            make_tool_call("call_2", "add_todo", "{}"),
        ]);

        let calls = accumulator.finalize();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].id, "call_2");
    }

    #[test]
    fn finalize_skips_calls_without_tool_name() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.update(make_tool_call("call_1", "", "{}"));

        assert!(accumulator.finalize().is_empty());
    }

    #[test]
    fn finalize_generates_missing_ids() {
        let parts = vec![PartialToolCall {
            id: String::new(),
            tool_type: String::new(),
            name: "list_todos".to_string(),
            arguments: String::new(),
        }];

        let calls = finalize_tool_calls(parts);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].tool_type, "function");
    }
}
