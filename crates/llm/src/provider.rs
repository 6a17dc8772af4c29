//! [`ModelProvider`] implementation for OpenAI-compatible streaming
//! chat-completions endpoints (OpenAI, Ollama, vLLM, ...).

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, trace};

use tablechat_tool_runtime::{
    ConversationMessage, LlmError, ModelProvider, StopReason, StreamEvent, ToolDefinition,
};

use crate::translate::{message_to_openai, tool_definition_to_openai};

/// Provider speaking `POST {base_url}/chat/completions` with `stream: true`.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    /// `base_url` must include the `/v1` segment
    /// (e.g. `https://api.openai.com/v1`, `http://localhost:11434/v1`).
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut api_messages: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &system_prompt {
            api_messages.push(json!({"role": "system", "content": system}));
        }
        api_messages.extend(messages.iter().map(message_to_openai));

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(tool_definition_to_openai).collect();
        }

        debug!(model = %self.model, url = %url, "starting streaming chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();

            if status == 401 {
                return Err(LlmError::AuthError);
            }
            if status == 429 {
                let retry_after = serde_json::from_str::<Value>(&body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            return Err(LlmError::ApiError {
                status,
                message: body_text,
            });
        }

        type ByteStream =
            Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

        struct State {
            bytes: ByteStream,
            buffer: String,
            assembler: ChunkAssembler,
            pending: VecDeque<StreamEvent>,
        }

        let state = State {
            bytes: Box::pin(response.bytes_stream()),
            buffer: String::new(),
            assembler: ChunkAssembler::new(),
            pending: VecDeque::new(),
        };

        let event_stream = stream::unfold(state, move |mut state| async move {
            use futures::StreamExt;
            loop {
                // Drain pending events first, preserving arrival order.
                if let Some(evt) = state.pending.pop_front() {
                    return Some((Ok(evt), state));
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&chunk));

                        while let Some(newline_pos) = state.buffer.find('\n') {
                            let line = state.buffer[..newline_pos]
                                .trim_end_matches('\r')
                                .to_string();
                            state.buffer = state.buffer[newline_pos + 1..].to_string();

                            if let Some(data) = line.strip_prefix("data: ") {
                                state.pending.extend(state.assembler.handle_data(data));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(LlmError::StreamError(e.to_string())), state));
                    }
                    None => {
                        return state.pending.pop_front().map(|evt| (Ok(evt), state));
                    }
                }
            }
        });

        Ok(Box::pin(event_stream))
    }

    fn provider_name(&self) -> &str {
        "openai-compat"
    }
}

/// Assembles OpenAI streaming chunks into provider-agnostic events.
///
/// Tracks tool-call indices so fragmented arguments map back to the right
/// call id, and closes every open call before the message ends.
struct ChunkAssembler {
    /// Maps the wire `index` of a tool call to its id, in open order.
    call_ids: Vec<String>,
    finished: bool,
}

impl ChunkAssembler {
    fn new() -> Self {
        Self {
            call_ids: Vec::new(),
            finished: false,
        }
    }

    /// Consume one `data:` payload, producing zero or more events.
    fn handle_data(&mut self, data: &str) -> Vec<StreamEvent> {
        if data.trim() == "[DONE]" {
            // A backend may drop the connection without a finish_reason;
            // close the message so the consumer always sees MessageEnd.
            if self.finished {
                return Vec::new();
            }
            return self.close(StopReason::EndTurn);
        }

        let Ok(chunk) = serde_json::from_str::<Value>(data) else {
            trace!(data, "ignoring unparseable stream chunk");
            return Vec::new();
        };

        let mut events = Vec::new();
        let Some(choice) = chunk["choices"].get(0) else {
            return events;
        };
        let delta = &choice["delta"];

        // Some backends expose the reasoning trace under "reasoning_content"
        // (DeepSeek style), others under "reasoning".
        if let Some(text) = delta["reasoning_content"]
            .as_str()
            .or_else(|| delta["reasoning"].as_str())
        {
            if !text.is_empty() {
                events.push(StreamEvent::ThinkingDelta {
                    text: text.to_string(),
                });
            }
        }

        if let Some(text) = delta["content"].as_str() {
            if !text.is_empty() {
                events.push(StreamEvent::TextDelta {
                    text: text.to_string(),
                });
            }
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"].as_u64().unwrap_or(0) as usize;

                if index >= self.call_ids.len() {
                    let id = tc["id"]
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
                    let name = tc["function"]["name"].as_str().unwrap_or("").to_string();
                    self.call_ids.resize(index + 1, String::new());
                    self.call_ids[index] = id.clone();
                    events.push(StreamEvent::ToolCallStart { id, name });
                }

                if let Some(arguments) = tc["function"]["arguments"].as_str() {
                    if !arguments.is_empty() {
                        events.push(StreamEvent::ToolCallDelta {
                            id: self.call_ids[index].clone(),
                            arguments_delta: arguments.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            let stop_reason = match reason {
                "stop" => StopReason::EndTurn,
                "tool_calls" => StopReason::ToolUse,
                "length" => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            };
            events.extend(self.close(stop_reason));
        }

        events
    }

    /// End every open tool call, then the message itself.
    fn close(&mut self, stop_reason: StopReason) -> Vec<StreamEvent> {
        self.finished = true;
        let mut events: Vec<StreamEvent> = self
            .call_ids
            .drain(..)
            .filter(|id| !id.is_empty())
            .map(|id| StreamEvent::ToolCallEnd { id })
            .collect();
        events.push(StreamEvent::MessageEnd { stop_reason });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(lines: &[&str]) -> Vec<StreamEvent> {
        let mut assembler = ChunkAssembler::new();
        lines
            .iter()
            .flat_map(|l| assembler.handle_data(l))
            .collect()
    }

    #[test]
    fn test_text_chunks() {
        let events = assemble(&[
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::TextDelta { text } if text == "Hel"));
        assert!(matches!(&events[1], StreamEvent::TextDelta { text } if text == "lo"));
        assert!(matches!(
            &events[2],
            StreamEvent::MessageEnd {
                stop_reason: StopReason::EndTurn
            }
        ));
    }

    #[test]
    fn test_tool_call_assembly() {
        let events = assemble(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"query_data","arguments":""}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"sql\":"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"SELECT 1\"}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]);

        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallStart { id, name } if id == "call_9" && name == "query_data"
        ));
        let args: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallDelta {
                    arguments_delta, ..
                } => Some(arguments_delta.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(args, r#"{"sql":"SELECT 1"}"#);
        assert!(matches!(
            &events[events.len() - 2],
            StreamEvent::ToolCallEnd { id } if id == "call_9"
        ));
        assert!(matches!(
            &events[events.len() - 1],
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse
            }
        ));
    }

    #[test]
    fn test_missing_tool_call_id_is_generated() {
        let events = assemble(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"visualize","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ]);
        let StreamEvent::ToolCallStart { id, .. } = &events[0] else {
            panic!("expected ToolCallStart");
        };
        assert!(id.starts_with("call_"));
    }

    #[test]
    fn test_thinking_delta() {
        let events = assemble(&[
            r#"{"choices":[{"delta":{"reasoning_content":"let me think"},"finish_reason":null}]}"#,
        ]);
        assert!(matches!(
            &events[0],
            StreamEvent::ThinkingDelta { text } if text == "let me think"
        ));
    }

    #[test]
    fn test_done_without_finish_reason_closes_message() {
        let events = assemble(&[
            r#"{"choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#,
            "[DONE]",
        ]);
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::MessageEnd { .. }
        ));
    }

    #[test]
    fn test_garbage_chunk_ignored() {
        let events = assemble(&["not json at all"]);
        assert!(events.is_empty());
    }
}
