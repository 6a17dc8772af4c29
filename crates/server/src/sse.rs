//! Wire-level SSE frames for the chat stream.
//!
//! Every frame is a named event with a JSON body. The terminal frame is
//! always `Done` with an empty object, sent exactly once per stream.

use axum::response::sse::Event;
use serde_json::{json, Value};

use tablechat_tool_runtime::ProgressEvent;

/// One server-sent event: name plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: &'static str,
    pub data: Value,
}

impl Frame {
    pub fn content(text: String) -> Self {
        Self {
            event: "content",
            data: json!({ "content": text }),
        }
    }

    pub fn thinking(text: String) -> Self {
        Self {
            event: "thinking",
            data: json!({ "content": text }),
        }
    }

    pub fn tool_call(tool_name: String, args: Value, tool_call_id: String) -> Self {
        Self {
            event: "tool_call",
            data: json!({
                "tool_name": tool_name,
                "args": args,
                "tool_call_id": tool_call_id,
            }),
        }
    }

    pub fn tool_result(result: String, tool_call_id: String) -> Self {
        Self {
            event: "tool_result",
            data: json!({
                "result": result,
                "tool_call_id": tool_call_id,
            }),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            event: "error",
            data: json!({ "content": message }),
        }
    }

    /// The terminal frame. Always the last frame of a stream.
    pub fn done() -> Self {
        Self {
            event: "Done",
            data: json!({}),
        }
    }

    pub fn from_progress(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::ToolCall {
                tool_name,
                tool_call_id,
                args,
            } => Self::tool_call(tool_name, args, tool_call_id),
            ProgressEvent::ToolResult {
                tool_call_id,
                result,
                ..
            } => Self::tool_result(result, tool_call_id),
        }
    }

    pub fn into_sse_event(self) -> Event {
        Event::default().event(self.event).data(self.data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_frame_shape() {
        let frame = Frame::done();
        assert_eq!(frame.event, "Done");
        assert_eq!(frame.data, json!({}));
    }

    #[test]
    fn test_from_progress_tool_call() {
        let frame = Frame::from_progress(ProgressEvent::ToolCall {
            tool_name: "query_data".to_string(),
            tool_call_id: "call_1".to_string(),
            args: json!({ "sql": "SELECT 1" }),
        });
        assert_eq!(frame.event, "tool_call");
        assert_eq!(frame.data["tool_name"], "query_data");
        assert_eq!(frame.data["args"]["sql"], "SELECT 1");
        assert_eq!(frame.data["tool_call_id"], "call_1");
    }

    #[test]
    fn test_from_progress_tool_result() {
        let frame = Frame::from_progress(ProgressEvent::ToolResult {
            tool_name: "query_data".to_string(),
            tool_call_id: "call_1".to_string(),
            result: "3 rows".to_string(),
        });
        assert_eq!(frame.event, "tool_result");
        assert_eq!(frame.data["result"], "3 rows");
        assert_eq!(frame.data["tool_call_id"], "call_1");
    }
}
