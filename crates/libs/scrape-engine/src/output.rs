//! Results produced by engine invocations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Subtitle track attached to a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub id: String,
    pub url: String,
    /// Caption file format (`srt`, `vtt`)
    #[serde(rename = "type")]
    pub format: String,
    /// ISO 639-1 language code
    pub language: String,
}

/// One quality variant of a file stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFile {
    /// Container type, e.g. `mp4`
    #[serde(rename = "type")]
    pub container: String,
    pub url: String,
}

/// A playable stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaStream {
    /// HLS playlist
    Hls {
        id: String,
        playlist: String,
        #[serde(default)]
        flags: Vec<String>,
        #[serde(default)]
        captions: Vec<Caption>,
    },

    /// Direct files keyed by quality label (`360`, `720`, `1080`, ...)
    File {
        id: String,
        qualities: BTreeMap<String, StreamFile>,
        #[serde(default)]
        flags: Vec<String>,
        #[serde(default)]
        captions: Vec<Caption>,
    },
}

/// Final result of a full discovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    /// Source that produced the stream
    pub source_id: String,

    /// Embed scraper that produced the stream, when it came via an embed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_id: Option<String>,

    pub stream: MediaStream,
}

/// Result of running a single embed scraper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedOutput {
    pub stream: Vec<MediaStream>,
}

/// Embed link returned by a source scraper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcererEmbed {
    pub embed_id: String,
    pub url: String,
}

/// Result of running a single source scraper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcererOutput {
    #[serde(default)]
    pub embeds: Vec<SourcererEmbed>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<Vec<MediaStream>>,
}

/// Anything an engine invocation can resolve with
///
/// Empty outputs are reported as `noOutput` instead of `completed`.
pub trait ScrapeOutput: Serialize + Send + 'static {
    /// True when the invocation produced nothing usable
    fn is_empty(&self) -> bool;
}

impl ScrapeOutput for RunOutput {
    fn is_empty(&self) -> bool {
        false
    }
}

impl ScrapeOutput for EmbedOutput {
    fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }
}

impl ScrapeOutput for SourcererOutput {
    fn is_empty(&self) -> bool {
        self.embeds.is_empty() && self.stream.as_ref().map_or(true, Vec::is_empty)
    }
}

impl<T: ScrapeOutput> ScrapeOutput for Option<T> {
    fn is_empty(&self) -> bool {
        self.as_ref().map_or(true, ScrapeOutput::is_empty)
    }
}
