use crate::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversationMessage {
    /// User's text input
    User(String),
    /// Assistant's response (may contain text and/or tool calls)
    Assistant(AssistantContent),
    /// Result of a tool execution
    ToolResult(ToolResult),
}

/// Content from the assistant that can contain mixed text and tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantContent {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantContent {
    /// Plain-text assistant turn, used when replaying client history.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Ordered message history for one agent run.
///
/// Built fresh per request from the client payload; nothing persists
/// across requests.
#[derive(Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn add_user_message(&mut self, text: String) {
        self.messages.push(ConversationMessage::User(text));
    }

    pub fn add_assistant_response(&mut self, content: AssistantContent) {
        self.messages.push(ConversationMessage::Assistant(content));
    }

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.messages.push(ConversationMessage::ToolResult(result));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_basic() {
        let mut conv = Conversation::new().with_system_prompt("be helpful".to_string());
        conv.add_user_message("Hello".to_string());
        conv.add_assistant_response(AssistantContent::text("Hi there!"));

        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.system_prompt(), Some("be helpful"));
    }

    #[test]
    fn test_conversation_with_tool_calls() {
        let mut conv = Conversation::new();
        conv.add_user_message("How many rows in sales?".to_string());
        conv.add_assistant_response(AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "query_data".to_string(),
                input: serde_json::json!({"sql": "SELECT COUNT(*) FROM sales"}),
            }],
        });
        conv.add_tool_result(ToolResult::ok("call_1", "100"));

        assert_eq!(conv.messages().len(), 3);
    }

    #[test]
    fn test_serialization() {
        let msg = ConversationMessage::User("test".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        let _roundtrip: ConversationMessage = serde_json::from_str(&json).unwrap();
    }
}
