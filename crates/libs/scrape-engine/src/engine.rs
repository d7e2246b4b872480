//! Engine contract and the provider-registry implementation

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::events::{
    DiscoverEmbedsEvent, DiscoveredEmbed, EngineEvent, EventSink, InitEvent, UpdateEvent,
};
use crate::fetch::Fetcher;
use crate::media::{EmbedRequest, ScrapeMedia, SourceRequest};
use crate::output::{EmbedOutput, RunOutput, SourcererOutput};
use crate::provider::{EmbedScraper, ProviderMeta, ScrapeContext, SourceScraper};

/// Operations the gateway needs from a scraping engine
///
/// Implementations must not keep per-request state between invocations: one
/// instance serves every connection of the process.
#[async_trait]
pub trait ScrapeEngine: Send + Sync {
    /// Full discovery across every source. `Ok(None)` when nothing was found.
    async fn run_all(&self, media: ScrapeMedia, events: EventSink) -> Result<Option<RunOutput>>;

    /// Run one specific source scraper
    async fn run_source_scraper(
        &self,
        request: SourceRequest,
        events: EventSink,
    ) -> Result<SourcererOutput>;

    /// Run one specific embed scraper
    async fn run_embed_scraper(&self, request: EmbedRequest, events: EventSink)
        -> Result<EmbedOutput>;

    /// Registered source scrapers, highest rank first
    fn list_sources(&self) -> Vec<ProviderMeta>;

    /// Registered embed scrapers, highest rank first
    fn list_embeds(&self) -> Vec<ProviderMeta>;
}

/// Engine running a fixed set of registered scrapers through a [`Fetcher`]
pub struct ProviderEngine {
    fetcher: Arc<dyn Fetcher>,
    sources: Vec<Arc<dyn SourceScraper>>,
    embeds: Vec<Arc<dyn EmbedScraper>>,
}

impl ProviderEngine {
    /// Create an empty engine using `fetcher` as its network layer
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            sources: Vec::new(),
            embeds: Vec::new(),
        }
    }

    /// Register a source scraper (replaces one with the same id)
    pub fn with_source(mut self, source: Arc<dyn SourceScraper>) -> Self {
        self.sources.retain(|s| s.meta().id != source.meta().id);
        self.sources.push(source);
        self.sources.sort_by(|a, b| b.meta().rank.cmp(&a.meta().rank));
        self
    }

    /// Register an embed scraper (replaces one with the same id)
    pub fn with_embed(mut self, embed: Arc<dyn EmbedScraper>) -> Self {
        self.embeds.retain(|e| e.meta().id != embed.meta().id);
        self.embeds.push(embed);
        self.embeds.sort_by(|a, b| b.meta().rank.cmp(&a.meta().rank));
        self
    }

    fn find_source(&self, id: &str) -> Option<&Arc<dyn SourceScraper>> {
        self.sources
            .iter()
            .find(|s| s.meta().id == id && !s.meta().disabled)
    }

    fn find_embed(&self, id: &str) -> Option<&Arc<dyn EmbedScraper>> {
        self.embeds
            .iter()
            .find(|e| e.meta().id == id && !e.meta().disabled)
    }

    fn context(&self, scraper_id: &str, events: &EventSink) -> ScrapeContext {
        ScrapeContext::new(self.fetcher.clone(), scraper_id, Some(events.clone()))
    }

    /// Try the embeds a source returned, best embed scraper first
    async fn run_discovered_embeds(
        &self,
        source_id: &str,
        output: &SourcererOutput,
        events: &EventSink,
    ) -> Result<Option<RunOutput>> {
        let mut candidates: Vec<(DiscoveredEmbed, &Arc<dyn EmbedScraper>, &str)> = output
            .embeds
            .iter()
            .enumerate()
            .filter_map(|(index, embed)| {
                self.find_embed(&embed.embed_id).map(|scraper| {
                    (
                        DiscoveredEmbed {
                            id: format!("{}-{}", source_id, index),
                            embed_scraper_id: embed.embed_id.clone(),
                        },
                        scraper,
                        embed.url.as_str(),
                    )
                })
            })
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        candidates.sort_by(|a, b| b.1.meta().rank.cmp(&a.1.meta().rank));

        events.emit(EngineEvent::DiscoverEmbeds(DiscoverEmbedsEvent {
            source_id: source_id.to_string(),
            embeds: candidates.iter().map(|(d, _, _)| d.clone()).collect(),
        }));

        for (discovered, scraper, url) in candidates {
            if events.is_closed() {
                return Err(EngineError::Cancelled);
            }

            events.emit(EngineEvent::Start(discovered.id.clone()));
            let ctx = self.context(&discovered.id, events);

            match scraper.scrape(&ctx, url).await {
                Ok(embed_output) => match embed_output.stream.into_iter().next() {
                    Some(stream) => {
                        events.emit(EngineEvent::Update(UpdateEvent::success(discovered.id)));
                        return Ok(Some(RunOutput {
                            source_id: source_id.to_string(),
                            embed_id: Some(scraper.meta().id.clone()),
                            stream,
                        }));
                    }
                    None => {
                        events.emit(EngineEvent::Update(UpdateEvent::from_error(
                            discovered.id,
                            EngineError::NotFound("No streams found".to_string()),
                        )));
                    }
                },
                Err(e) => {
                    tracing::debug!(embed = %scraper.meta().id, error = %e, "Embed scraper failed");
                    events.emit(EngineEvent::Update(UpdateEvent::from_error(discovered.id, e)));
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl ScrapeEngine for ProviderEngine {
    async fn run_all(&self, media: ScrapeMedia, events: EventSink) -> Result<Option<RunOutput>> {
        let sources: Vec<&Arc<dyn SourceScraper>> =
            self.sources.iter().filter(|s| !s.meta().disabled).collect();

        events.emit(EngineEvent::Init(InitEvent {
            source_ids: sources.iter().map(|s| s.meta().id.clone()).collect(),
        }));

        for source in sources {
            if events.is_closed() {
                return Err(EngineError::Cancelled);
            }

            let source_id = source.meta().id.clone();
            events.emit(EngineEvent::Start(source_id.clone()));

            let ctx = self.context(&source_id, &events);
            let output = match source.scrape(&ctx, &media).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::debug!(source = %source_id, error = %e, "Source scraper failed");
                    events.emit(EngineEvent::Update(UpdateEvent::from_error(source_id, e)));
                    continue;
                }
            };

            if let Some(stream) = output.stream.iter().flatten().next().cloned() {
                events.emit(EngineEvent::Update(UpdateEvent::success(source_id.clone())));
                return Ok(Some(RunOutput {
                    source_id,
                    embed_id: None,
                    stream,
                }));
            }

            if output.embeds.is_empty() {
                events.emit(EngineEvent::Update(UpdateEvent::from_error(
                    source_id,
                    EngineError::NotFound("No streams or embeds found".to_string()),
                )));
                continue;
            }

            if let Some(found) = self.run_discovered_embeds(&source_id, &output, &events).await? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    async fn run_source_scraper(
        &self,
        request: SourceRequest,
        events: EventSink,
    ) -> Result<SourcererOutput> {
        let source = self
            .find_source(&request.id)
            .ok_or_else(|| EngineError::UnknownScraper(request.id.clone()))?;

        let ctx = self.context(&request.id, &events);
        source.scrape(&ctx, &request.media).await
    }

    async fn run_embed_scraper(
        &self,
        request: EmbedRequest,
        events: EventSink,
    ) -> Result<EmbedOutput> {
        let embed = self
            .find_embed(&request.id)
            .ok_or_else(|| EngineError::UnknownScraper(request.id.clone()))?;

        let ctx = self.context(&request.id, &events);
        embed.scrape(&ctx, &request.url).await
    }

    fn list_sources(&self) -> Vec<ProviderMeta> {
        self.sources
            .iter()
            .filter(|s| !s.meta().disabled)
            .map(|s| s.meta().clone())
            .collect()
    }

    fn list_embeds(&self) -> Vec<ProviderMeta> {
        self.embeds
            .iter()
            .filter(|e| !e.meta().disabled)
            .map(|e| e.meta().clone())
            .collect()
    }
}
