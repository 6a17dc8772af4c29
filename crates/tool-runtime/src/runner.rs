//! The agentic loop: LLM ↔ tool execution, streamed to a consumer channel.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::conversation::{AssistantContent, Conversation, ConversationMessage};
use crate::prompt;
use crate::provider::{LlmError, ModelProvider};
use crate::registry::ToolRegistry;
use crate::stream::{RunEvent, StopReason, StreamEvent};
use crate::tool::{ToolCall, ToolResult};

type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// A tool call whose arguments are still streaming in.
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Drives one agent run: stream the model, execute requested tools, feed
/// the results back, repeat until the model answers in plain text.
///
/// The runner holds no per-request state (everything per-run lives in the
/// [`RunContext`] and [`Conversation`] owned by the call), so one instance
/// is safely shared across concurrent requests.
pub struct AgentRunner {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
    max_retries: usize,
    temperature: f32,
    max_tokens: u32,
}

impl AgentRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            max_iterations: 10,
            max_retries: 3,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Run one agent turn, forwarding text/thinking deltas to `events` as
    /// they arrive. Tool activity reaches the consumer through the
    /// context's progress channel, not through `events`.
    ///
    /// A closed `events` channel means the consumer is gone; the run stops
    /// quietly and returns `Ok(())`.
    pub async fn run_streaming(
        &self,
        user_prompt: &str,
        history: Vec<ConversationMessage>,
        ctx: RunContext,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<(), AgentError> {
        let mut conversation =
            Conversation::new().with_system_prompt(prompt::system_prompt(ctx.dataset_info()));
        for message in history {
            conversation.push(message);
        }
        conversation.add_user_message(user_prompt.to_string());

        for iteration in 0..self.max_iterations {
            debug!(iteration, "starting agent iteration");

            let mut stream = self.open_stream(&conversation).await?;

            let mut text_parts: Vec<String> = Vec::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            // Providers may interleave several calls and defer every End
            // until the message closes, so in-flight calls are keyed by id.
            let mut open_calls: Vec<PendingToolCall> = Vec::new();
            let mut stop_reason = StopReason::EndTurn;

            while let Some(event) = stream.next().await {
                match event.map_err(AgentError::Provider)? {
                    StreamEvent::TextDelta { text } => {
                        text_parts.push(text.clone());
                        if events.send(RunEvent::TextDelta { text }).await.is_err() {
                            debug!("event consumer gone, cancelling run");
                            return Ok(());
                        }
                    }
                    StreamEvent::ThinkingDelta { text } => {
                        if events.send(RunEvent::ThinkingDelta { text }).await.is_err() {
                            debug!("event consumer gone, cancelling run");
                            return Ok(());
                        }
                    }
                    StreamEvent::ToolCallStart { id, name } => {
                        open_calls.push(PendingToolCall {
                            id,
                            name,
                            arguments: String::new(),
                        });
                    }
                    StreamEvent::ToolCallDelta {
                        id,
                        arguments_delta,
                    } => {
                        if let Some(call) = open_calls.iter_mut().find(|c| c.id == id) {
                            call.arguments.push_str(&arguments_delta);
                        } else {
                            warn!(%id, "arguments for unknown tool call, dropping");
                        }
                    }
                    StreamEvent::ToolCallEnd { id } => {
                        let Some(pos) = open_calls.iter().position(|c| c.id == id) else {
                            warn!(%id, "end for unknown tool call, dropping");
                            continue;
                        };
                        let call = open_calls.remove(pos);
                        let input: serde_json::Value =
                            serde_json::from_str(&call.arguments).unwrap_or_default();
                        tool_calls.push(ToolCall {
                            id: call.id,
                            name: call.name,
                            input,
                        });
                    }
                    StreamEvent::MessageEnd {
                        stop_reason: reason,
                    } => {
                        stop_reason = reason;
                    }
                    StreamEvent::Error { message } => {
                        return Err(AgentError::Stream(message));
                    }
                }
            }

            let text = if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join(""))
            };
            conversation.add_assistant_response(AssistantContent {
                text,
                tool_calls: tool_calls.clone(),
            });

            if tool_calls.is_empty() {
                info!(iteration, ?stop_reason, "agent run complete");
                return Ok(());
            }

            // Tools run strictly in order: query_data must record its
            // result before a later visualize call reads it.
            info!(count = tool_calls.len(), "executing tool calls");
            for call in &tool_calls {
                let result = self.execute_tool_call(call, &ctx).await;
                conversation.add_tool_result(result);
            }
        }

        Err(AgentError::MaxIterations(self.max_iterations))
    }

    /// Open the provider stream, retrying transient setup failures.
    async fn open_stream(&self, conversation: &Conversation) -> Result<EventStream, AgentError> {
        let mut attempt = 0;
        loop {
            let result = self
                .provider
                .stream_with_tools(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    self.registry.list(),
                    self.temperature,
                    self.max_tokens,
                )
                .await;

            match result {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = match &e {
                        LlmError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs)
                        }
                        _ => Duration::from_millis(500),
                    };
                    attempt += 1;
                    warn!(attempt, error = %e, "provider request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(AgentError::Provider(e)),
            }
        }
    }

    async fn execute_tool_call(&self, call: &ToolCall, ctx: &RunContext) -> ToolResult {
        match self.registry.get(&call.name) {
            Some(tool) => match tool.execute(call, ctx).await {
                Ok(mut result) => {
                    result.tool_call_id = call.id.clone();
                    result
                }
                Err(e) => ToolResult::error(call.id.clone(), format!("Tool error: {}", e)),
            },
            None => ToolResult::error(call.id.clone(), format!("Unknown tool: {}", call.name)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Provider(#[from] LlmError),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Max iterations ({0}) exceeded")]
    MaxIterations(usize),
}
