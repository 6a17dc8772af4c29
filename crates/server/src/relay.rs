//! The chat event relay.
//!
//! One agent run feeds two channels: text/thinking deltas through the
//! runner's event channel and tool activity through the context's progress
//! channel. This module merges both into a single ordered frame stream and
//! guarantees the terminal contract: a connected client sees exactly one
//! `Done` frame, and it is always the last frame. A disconnected client is
//! owed nothing; both tasks are torn down as soon as the stream drops.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error};

use tablechat_datastore::DatasetStore;
use tablechat_tool_runtime::{
    AgentRunner, AssistantContent, ConversationMessage, ProgressSender, RunContext, RunEvent,
};

use crate::api::MessagePayload;
use crate::sse::Frame;

/// Frames buffered toward the client before the merge loop awaits. The
/// progress channel upstream is unbounded, so this is the only point where
/// a slow reader exerts backpressure.
const FRAME_BUFFER: usize = 64;

/// Split a chat request into the prompt (last message) and the prior
/// conversation. Returns `None` for an empty request. Roles other than
/// `user`/`assistant` in the history are dropped.
pub fn split_request(
    mut messages: Vec<MessagePayload>,
) -> Option<(String, Vec<ConversationMessage>)> {
    let last = messages.pop()?;
    let history = messages
        .into_iter()
        .filter_map(|m| match m.role.as_str() {
            "user" => Some(ConversationMessage::User(m.content)),
            "assistant" => Some(ConversationMessage::Assistant(AssistantContent::text(
                m.content,
            ))),
            _ => None,
        })
        .collect();
    Some((last.content, history))
}

/// Start an agent run and return its merged frame stream.
///
/// Two tasks are spawned: the driver (the agent run itself) and the merge
/// loop. Dropping the returned stream aborts both.
pub fn chat_stream(
    runner: Arc<AgentRunner>,
    store: Arc<DatasetStore>,
    output_dir: PathBuf,
    prompt: String,
    history: Vec<ConversationMessage>,
) -> FrameStream {
    let (frame_tx, frame_rx) = mpsc::channel::<Frame>(FRAME_BUFFER);
    let (event_tx, mut event_rx) = mpsc::channel::<RunEvent>(FRAME_BUFFER);
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    // The context owns every progress sender; when the run returns and the
    // context drops, the progress channel closes and the merge loop knows
    // no more tool events can arrive.
    let ctx = RunContext::new(store, output_dir, ProgressSender::new(progress_tx));

    let driver = tokio::spawn(async move {
        runner.run_streaming(&prompt, history, ctx, event_tx).await
    });
    let driver_abort = driver.abort_handle();

    let merge = tokio::spawn(async move {
        let mut events_open = true;
        let mut progress_open = true;

        while events_open || progress_open {
            // Biased, progress arm first: a tool's call/result events are
            // enqueued strictly before the run can stream any post-tool
            // text, so when both channels are ready the progress event is
            // always the older one. An unbiased poll could emit a later
            // content frame ahead of it.
            let frame = tokio::select! {
                biased;
                event = progress_rx.recv(), if progress_open => match event {
                    Some(event) => Frame::from_progress(event),
                    None => {
                        progress_open = false;
                        continue;
                    }
                },
                event = event_rx.recv(), if events_open => match event {
                    Some(RunEvent::TextDelta { text }) => Frame::content(text),
                    Some(RunEvent::ThinkingDelta { text }) => Frame::thinking(text),
                    None => {
                        events_open = false;
                        continue;
                    }
                },
            };
            if frame_tx.send(frame).await.is_err() {
                // Client gone; a closed connection is owed no terminal frame.
                debug!("chat client disconnected, aborting agent run");
                driver.abort();
                return;
            }
        }

        // Both channels closed, so the run has returned (or panicked).
        // Surface at most one error frame, then the terminal Done.
        match driver.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "agent run failed");
                let _ = frame_tx.send(Frame::error(e.to_string())).await;
            }
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                error!(error = %e, "agent task panicked");
                let _ = frame_tx
                    .send(Frame::error("internal server error".to_string()))
                    .await;
            }
        }
        let _ = frame_tx.send(Frame::done()).await;
    });

    FrameStream {
        rx: frame_rx,
        guard: AbortOnDrop(vec![driver_abort, merge.abort_handle()]),
    }
}

/// The merged frame stream handed to the SSE response. Aborts the driver
/// and merge tasks when dropped.
pub struct FrameStream {
    rx: mpsc::Receiver<Frame>,
    guard: AbortOnDrop,
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
