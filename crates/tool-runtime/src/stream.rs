use serde::{Deserialize, Serialize};

/// Events emitted while streaming one LLM response.
/// Provider-agnostic; translated from the wire format in the provider layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A chunk of assistant text
    TextDelta { text: String },
    /// A chunk of the model's reasoning trace, if the backend exposes one
    ThinkingDelta { text: String },
    /// Start of a tool call (LLM wants to execute a tool)
    ToolCallStart { id: String, name: String },
    /// Incremental JSON argument data for a tool call
    ToolCallDelta { id: String, arguments_delta: String },
    /// Tool call arguments are complete
    ToolCallEnd { id: String },
    /// The entire message is complete
    MessageEnd { stop_reason: StopReason },
    /// An error occurred during streaming
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Normal end of response
    EndTurn,
    /// Model wants to use tools
    ToolUse,
    /// Hit max tokens limit
    MaxTokens,
    /// Stopped by stop sequence
    StopSequence,
}

/// What the runner forwards to its consumer while a run is in flight.
///
/// Tool activity travels on the per-request progress channel instead, so
/// the relay has exactly one source for each kind of event.
#[derive(Debug, Clone)]
pub enum RunEvent {
    TextDelta { text: String },
    ThinkingDelta { text: String },
}
