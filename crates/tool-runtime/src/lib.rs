pub mod chart;
pub mod context;
pub mod conversation;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod stream;
pub mod tool;
pub mod tools;

pub use context::{ProgressEvent, ProgressSender, RunContext};
pub use conversation::{AssistantContent, Conversation, ConversationMessage};
pub use provider::{LlmError, ModelProvider};
pub use registry::ToolRegistry;
pub use runner::{AgentError, AgentRunner};
pub use stream::{RunEvent, StopReason, StreamEvent};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolError, ToolResult};
pub use tools::{QueryDataTool, VisualizeTool};
