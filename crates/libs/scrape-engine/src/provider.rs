//! Scraper traits implemented by individual providers

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::events::{EngineEvent, EventSink, UpdateEvent};
use crate::fetch::Fetcher;
use crate::media::ScrapeMedia;
use crate::output::{EmbedOutput, SourcererOutput};

/// Provider category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Source,
    Embed,
}

/// Static description of a provider, as listed by `/metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMeta {
    pub id: String,
    pub name: String,
    /// Higher ranks are tried first
    pub rank: u32,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(skip)]
    pub disabled: bool,
}

impl ProviderMeta {
    pub fn source(id: impl Into<String>, name: impl Into<String>, rank: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank,
            kind: ProviderKind::Source,
            disabled: false,
        }
    }

    pub fn embed(id: impl Into<String>, name: impl Into<String>, rank: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank,
            kind: ProviderKind::Embed,
            disabled: false,
        }
    }
}

/// What a scraper gets to work with
#[derive(Clone)]
pub struct ScrapeContext {
    /// Network layer for every outbound call
    pub fetcher: Arc<dyn Fetcher>,

    scraper_id: String,
    events: Option<EventSink>,
}

impl ScrapeContext {
    /// Context reporting progress for `scraper_id` into `events`
    pub fn new(fetcher: Arc<dyn Fetcher>, scraper_id: impl Into<String>, events: Option<EventSink>) -> Self {
        Self {
            fetcher,
            scraper_id: scraper_id.into(),
            events,
        }
    }

    /// Report intermediate progress (0-100)
    pub fn progress(&self, percentage: u8) {
        if let Some(events) = &self.events {
            events.emit(EngineEvent::Update(UpdateEvent::pending(
                self.scraper_id.clone(),
                percentage,
            )));
        }
    }
}

/// A site that maps media to streams or embed links
#[async_trait]
pub trait SourceScraper: Send + Sync {
    fn meta(&self) -> &ProviderMeta;

    async fn scrape(&self, ctx: &ScrapeContext, media: &ScrapeMedia) -> Result<SourcererOutput>;
}

/// A video host that turns an embed URL into streams
#[async_trait]
pub trait EmbedScraper: Send + Sync {
    fn meta(&self) -> &ProviderMeta;

    async fn scrape(&self, ctx: &ScrapeContext, url: &str) -> Result<EmbedOutput>;
}
