//! Types for the chat completions API.
//!
//! These types match the `OpenAI` Chat Completions wire format for
//! function calling.

use serde::{Deserialize, Serialize};

/// A message in a conversation with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender ("system", "user", "assistant", "tool").
    pub role: String,
    /// The text content of the message. Absent on pure tool-call turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For `tool` role messages: the ID of the tool call being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A plain text message with the given role.
    #[must_use]
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn consisting only of tool calls.
    #[must_use]
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// A tool result message answering a tool call.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call.
    pub id: String,
    /// Call type (always "function").
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function being called.
    pub function: FunctionCall,
}

/// The function portion of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call.
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

impl FunctionCall {
    /// Parse the JSON arguments string.
    ///
    /// Models occasionally emit malformed argument JSON; callers treat a
    /// parse failure as a failed tool invocation, not a request failure.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the arguments are not valid JSON.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool type (always "function").
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function definition.
    pub function: FunctionDef,
}

/// A function definition within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Name of the function.
    pub name: String,
    /// Description of what the function does.
    pub description: String,
    /// JSON Schema for the function's parameters.
    pub parameters: serde_json::Value,
}

impl Tool {
    /// Build a function tool from its parts.
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Request body for the chat completions API.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// Conversation messages, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Available tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Response from the chat completions API.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique response ID.
    pub id: String,
    /// Model that generated the response.
    pub model: String,
    /// Response choices (one unless `n` is requested).
    pub choices: Vec<Choice>,
    /// Token usage information.
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// The first (and normally only) choice's message.
    #[must_use]
    pub fn message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|c| &c.message)
    }

    /// The first choice's finish reason.
    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }
}

/// A single response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Choice index.
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Reason generation stopped.
    pub finish_reason: Option<FinishReason>,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Max tokens reached.
    Length,
    /// Tool calls requested.
    ToolCalls,
    /// Content was filtered.
    ContentFilter,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Number of input tokens.
    pub prompt_tokens: u32,
    /// Number of output tokens.
    pub completion_tokens: u32,
    /// Total tokens.
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_serialization() {
        let msg = ChatMessage::text("user", "Hello");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
        // Absent fields must not be serialized
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_tool_result_message_serialization() {
        let msg = ChatMessage::tool_result("call_123", "{\"count\":2}");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"role\":\"tool\""));
        assert!(json.contains("\"tool_call_id\":\"call_123\""));
    }

    #[test]
    fn test_tool_definition_serialization() {
        let tool = Tool::function(
            "search_products",
            "Search the product catalog",
            serde_json::json!({"type": "object", "properties": {}}),
        );
        let json = serde_json::to_string(&tool).expect("serialize");
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("\"name\":\"search_products\""));
    }

    #[test]
    fn test_response_deserialization_with_tool_calls() {
        let json = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "search_products", "arguments": "{\"query\":\"mug\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.finish_reason(), Some(FinishReason::ToolCalls));

        let message = response.message().expect("has message");
        let calls = message.tool_calls.as_ref().expect("has tool calls");
        assert_eq!(calls.len(), 1);
        let call = calls.first().expect("first call");
        assert_eq!(call.function.name, "search_products");

        let args = call.function.parse_arguments().expect("valid arguments");
        assert_eq!(args["query"], "mug");
    }

    #[test]
    fn test_parse_arguments_rejects_malformed_json() {
        let call = FunctionCall {
            name: "search_products".to_string(),
            arguments: "{\"query\": ".to_string(),
        };
        assert!(call.parse_arguments().is_err());
    }

    #[test]
    fn test_finish_reason_deserialization() {
        let reason: FinishReason = serde_json::from_str("\"stop\"").expect("deserialize");
        assert_eq!(reason, FinishReason::Stop);

        let reason: FinishReason = serde_json::from_str("\"tool_calls\"").expect("deserialize");
        assert_eq!(reason, FinishReason::ToolCalls);
    }
}
