use crate::conversation::ConversationMessage;
use crate::stream::StreamEvent;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Trait for LLM backends that support tool use and streaming.
///
/// Owned by the agent loop, its consumer. Implementations live in
/// crates/llm.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stream a response from the LLM with tool definitions available.
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError>;

    /// Non-streaming convenience for one-shot calls (no tools): collects
    /// the stream's text into a single string.
    async fn complete(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        use futures::StreamExt;
        let mut stream = self
            .stream_with_tools(messages, system_prompt, Vec::new(), temperature, max_tokens)
            .await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta { text: delta } => text.push_str(&delta),
                StreamEvent::Error { message } => return Err(LlmError::StreamError(message)),
                _ => {}
            }
        }
        Ok(text)
    }

    /// Provider name for logging/debugging (e.g., "openai-compat", "mock")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Transient faults worth retrying: network blips, rate limits, and
    /// server-side 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::NetworkError(_) | LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Mock provider for testing agent flows without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::StopReason;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns pre-configured responses in FIFO order.
    pub struct MockModelProvider {
        responses: Mutex<VecDeque<Result<Vec<StreamEvent>, LlmError>>>,
    }

    impl MockModelProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
            }
        }

        /// Queue a response that will be returned on the next call.
        pub fn queue_response(&self, events: Vec<StreamEvent>) {
            self.responses.lock().unwrap().push_back(Ok(events));
        }

        /// Queue a simple text response.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(vec![
                StreamEvent::TextDelta {
                    text: text.to_string(),
                },
                StreamEvent::MessageEnd {
                    stop_reason: StopReason::EndTurn,
                },
            ]);
        }

        /// Queue a single-call tool-use turn.
        pub fn queue_tool_call(&self, id: &str, name: &str, arguments: &str) {
            self.queue_response(vec![
                StreamEvent::ToolCallStart {
                    id: id.to_string(),
                    name: name.to_string(),
                },
                StreamEvent::ToolCallDelta {
                    id: id.to_string(),
                    arguments_delta: arguments.to_string(),
                },
                StreamEvent::ToolCallEnd { id: id.to_string() },
                StreamEvent::MessageEnd {
                    stop_reason: StopReason::ToolUse,
                },
            ]);
        }

        /// Queue a failure for the next stream_with_tools call.
        pub fn queue_failure(&self, error: LlmError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }
    }

    impl Default for MockModelProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ModelProvider for MockModelProvider {
        async fn stream_with_tools(
            &self,
            _messages: Vec<ConversationMessage>,
            _system_prompt: Option<String>,
            _tools: Vec<ToolDefinition>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError>
        {
            let next = self.responses.lock().unwrap().pop_front();
            let events = match next {
                Some(Ok(events)) => events,
                Some(Err(error)) => return Err(error),
                None => vec![StreamEvent::MessageEnd {
                    stop_reason: StopReason::EndTurn,
                }],
            };
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
