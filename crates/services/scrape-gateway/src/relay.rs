//! Engine-to-SSE event relay
//!
//! One relay serves one connection. The engine runs on its own task and
//! reports through an [`EventSink`]; the relay is the single reader of that
//! queue, so frames come out one at a time with strictly increasing ids no
//! matter how many scrapers report concurrently.
//!
//! ```text
//!  Open ──(token frame if a session was just issued)──▶ Streaming ──▶ Closed
//!                                                          │
//!            completed  (non-empty result) ◀───────────────┤
//!            noOutput   (empty result)     ◀───────────────┤
//!            error      (engine failure)   ◀───────────────┘
//! ```
//!
//! Exactly one terminal frame is produced and the stream ends right after it.
//! Dropping the stream (client went away) aborts the engine task.

use std::future::Future;

use futures::stream::Stream;
use mediascrape_engine::events::{EngineEvent, EventSink, UpdateEvent, UpdateStatus};
use mediascrape_engine::{EngineError, ScrapeOutput};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Frame tags understood by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Token,
    DiscoverEmbeds,
    Init,
    Start,
    Update,
    Completed,
    NoOutput,
    Error,
}

impl FrameKind {
    /// Wire name of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Token => "token",
            FrameKind::DiscoverEmbeds => "discoverEmbeds",
            FrameKind::Init => "init",
            FrameKind::Start => "start",
            FrameKind::Update => "update",
            FrameKind::Completed => "completed",
            FrameKind::NoOutput => "noOutput",
            FrameKind::Error => "error",
        }
    }

    /// Whether the stream ends after this frame
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FrameKind::Completed | FrameKind::NoOutput | FrameKind::Error
        )
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Stream-local sequence number
    pub id: u64,
    pub event: FrameKind,
    /// JSON payload, empty for payload-less frames
    pub data: String,
}

impl SseFrame {
    /// Convert to an axum SSE event
    pub fn to_event(&self) -> axum::response::sse::Event {
        axum::response::sse::Event::default()
            .id(self.id.to_string())
            .event(self.event.as_str())
            .data(&self.data)
    }
}

/// Plain error record sent to clients instead of the live error value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
    /// Error followed by its source chain, one cause per line
    pub stack: String,
}

impl ErrorPayload {
    /// Flatten an engine error and its causes
    pub fn from_engine_error(error: &EngineError) -> Self {
        let message = error.to_string();
        let mut stack = format!("{}: {}", error.name(), message);

        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            name: error.name().to_string(),
            message,
            stack,
        }
    }
}

/// Wire shape of an `update` frame
#[derive(Debug, Serialize)]
struct UpdatePayload {
    id: String,
    percentage: u8,
    status: UpdateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<UpdateEvent> for UpdatePayload {
    fn from(update: UpdateEvent) -> Self {
        Self {
            id: update.id,
            percentage: update.percentage,
            status: update.status,
            error: update.error.as_ref().map(ErrorPayload::from_engine_error),
            reason: update.reason,
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize frame payload: {}", e);
        "null".to_string()
    })
}

/// Per-stream frame id sequence, starting at 0
#[derive(Debug, Default)]
struct FrameSequence {
    next_id: u64,
}

impl FrameSequence {
    fn frame(&mut self, event: FrameKind, data: String) -> SseFrame {
        let id = self.next_id;
        self.next_id += 1;
        tracing::trace!(id, event = event.as_str(), "SSE frame");
        SseFrame { id, event, data }
    }

    fn engine_event(&mut self, event: EngineEvent) -> SseFrame {
        match event {
            EngineEvent::Init(init) => self.frame(FrameKind::Init, encode(&init)),
            EngineEvent::Start(id) => self.frame(FrameKind::Start, encode(&id)),
            EngineEvent::Update(update) => {
                self.frame(FrameKind::Update, encode(&UpdatePayload::from(update)))
            }
            EngineEvent::DiscoverEmbeds(discovered) => {
                self.frame(FrameKind::DiscoverEmbeds, encode(&discovered))
            }
        }
    }

    fn terminal<O: ScrapeOutput>(
        &mut self,
        result: Result<Result<O, EngineError>, oneshot::error::RecvError>,
    ) -> SseFrame {
        match result {
            Ok(Ok(output)) if output.is_empty() => self.frame(FrameKind::NoOutput, String::new()),
            Ok(Ok(output)) => self.frame(FrameKind::Completed, encode(&output)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Engine invocation failed");
                self.frame(
                    FrameKind::Error,
                    encode(&ErrorPayload::from_engine_error(&e)),
                )
            }
            Err(_) => {
                // The engine task died without reporting (panicked)
                let e = EngineError::Internal("engine task terminated unexpectedly".to_string());
                tracing::error!("Engine task terminated without a result");
                self.frame(
                    FrameKind::Error,
                    encode(&ErrorPayload::from_engine_error(&e)),
                )
            }
        }
    }
}

/// Aborts the engine task when the relay stream is dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Step<O> {
    Event(EngineEvent),
    Done(Result<Result<O, EngineError>, oneshot::error::RecvError>),
}

/// Run one engine invocation and relay it as an ordered, terminated frame stream
///
/// `renewed_token` is emitted first as a `token` frame. `invoke` receives the
/// event sink and is spawned on its own task.
pub fn relay<O, F, Fut>(
    renewed_token: Option<String>,
    invoke: F,
) -> impl Stream<Item = SseFrame> + Send + 'static
where
    O: ScrapeOutput,
    F: FnOnce(EventSink) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, EngineError>> + Send + 'static,
{
    async_stream::stream! {
        let mut frames = FrameSequence::default();

        if let Some(token) = renewed_token {
            yield frames.frame(FrameKind::Token, encode(&token));
        }

        let (sink, mut events) = EventSink::channel();
        let (done_tx, mut done_rx) = oneshot::channel::<Result<O, EngineError>>();

        let task = tokio::spawn(async move {
            let result = invoke(sink).await;
            let _ = done_tx.send(result);
        });
        let _abort = AbortOnDrop(task.abort_handle());

        loop {
            let step = tokio::select! {
                biased;
                Some(event) = events.recv() => Step::Event(event),
                result = &mut done_rx => Step::Done(result),
            };

            match step {
                Step::Event(event) => yield frames.engine_event(event),
                Step::Done(result) => {
                    // Events queued before the invocation resolved still go out first
                    while let Ok(event) = events.try_recv() {
                        yield frames.engine_event(event);
                    }

                    let terminal = frames.terminal(result);
                    tracing::debug!(
                        event = terminal.event.as_str(),
                        frames = terminal.id + 1,
                        "SSE stream finished"
                    );
                    yield terminal;
                    break;
                }
            }
        }
    }
}
