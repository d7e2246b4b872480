//! Progress events reported by the engine
//!
//! The engine reports progress through a single [`EventSink`]. Every scraper
//! task gets a clone; events from concurrently running scrapers land in one
//! queue in the order they were emitted, and the consumer decides how to
//! present them.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// Sent once before any source runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitEvent {
    /// Source ids that will be tried, in order
    pub source_ids: Vec<String>,
}

/// Outcome category of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Failure,
    NotFound,
    Pending,
}

/// Progress of a single source or embed scraper
#[derive(Debug)]
pub struct UpdateEvent {
    /// Scraper id (source id, or embed id inside a source run)
    pub id: String,

    /// Progress percentage, 0-100
    pub percentage: u8,

    pub status: UpdateStatus,

    /// Error that caused a failure, if any
    pub error: Option<EngineError>,

    /// Human readable explanation for not-found outcomes
    pub reason: Option<String>,
}

impl UpdateEvent {
    /// Scraper still running
    pub fn pending(id: impl Into<String>, percentage: u8) -> Self {
        Self {
            id: id.into(),
            percentage: percentage.min(100),
            status: UpdateStatus::Pending,
            error: None,
            reason: None,
        }
    }

    /// Scraper finished successfully
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            percentage: 100,
            status: UpdateStatus::Success,
            error: None,
            reason: None,
        }
    }

    /// Scraper finished without result. Not-found errors become `notfound`,
    /// everything else is a `failure` carrying the error.
    pub fn from_error(id: impl Into<String>, error: EngineError) -> Self {
        let id = id.into();
        if let EngineError::NotFound(reason) = error {
            return Self {
                id,
                percentage: 100,
                status: UpdateStatus::NotFound,
                error: None,
                reason: Some(reason),
            };
        }

        Self {
            id,
            percentage: 100,
            status: UpdateStatus::Failure,
            error: Some(error),
            reason: None,
        }
    }
}

/// Embed found by a source scraper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEmbed {
    /// Position-based id, unique within one run
    pub id: String,

    /// Id of the embed scraper that will handle it
    pub embed_scraper_id: String,
}

/// A source returned embeds that will be tried next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverEmbedsEvent {
    pub source_id: String,
    pub embeds: Vec<DiscoveredEmbed>,
}

/// Everything the engine can report while running
#[derive(Debug)]
pub enum EngineEvent {
    Init(InitEvent),
    Start(String),
    Update(UpdateEvent),
    DiscoverEmbeds(DiscoverEmbedsEvent),
}

impl EngineEvent {
    /// Event tag as used on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            EngineEvent::Init(_) => "init",
            EngineEvent::Start(_) => "start",
            EngineEvent::Update(_) => "update",
            EngineEvent::DiscoverEmbeds(_) => "discoverEmbeds",
        }
    }
}

/// Cloneable handle the engine reports progress through
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    /// Create a sink and the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event. Returns `false` once the consumer is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let tag = event.tag();
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::trace!(event = tag, "Event dropped, consumer closed");
                false
            }
        }
    }

    /// Whether the consumer has stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
