//! Media scraping engine contract
//!
//! Types shared between the gateway and whatever does the actual scraping:
//!
//! - [`media`]: requests handed to the engine (`ScrapeMedia`, `EmbedRequest`, `SourceRequest`)
//! - [`events`]: progress events, reported through one [`EventSink`] queue
//! - [`output`]: results and the empty/non-empty distinction
//! - [`fetch`]: the [`Fetcher`] network layer scrapers must use for every outbound call
//! - [`provider`] / [`engine`]: scraper traits and a registry engine running them
//!
//! # Event flow
//!
//! ```text
//! ┌──────────────┐  EventSink (clone per scraper)  ┌──────────────────┐
//! │  Scrapers    │ ──────────────────────────────▶ │  mpsc queue      │ ──▶ consumer
//! │  (concurrent)│                                 │  (single reader) │
//! └──────┬───────┘                                 └──────────────────┘
//!        │ Fetcher
//!        ▼
//!   direct / proxy
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod fetch;
pub mod media;
pub mod output;
pub mod provider;

pub use engine::{ProviderEngine, ScrapeEngine};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventSink, UpdateEvent, UpdateStatus};
pub use fetch::{FetchError, FetchOptions, FetchResponse, Fetcher};
pub use media::{EmbedRequest, MediaPart, ScrapeMedia, SourceRequest};
pub use output::{EmbedOutput, MediaStream, RunOutput, ScrapeOutput, SourcererOutput};
pub use provider::{EmbedScraper, ProviderMeta, ScrapeContext, SourceScraper};
