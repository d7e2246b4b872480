//! Request types handed to the engine
//!
//! A request is built once by the gateway (after query validation) and moved
//! into a single engine invocation. The engine never keeps it past that call.

use serde::{Deserialize, Serialize};

/// Season or episode reference inside a show request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPart {
    /// Episode or season number
    pub number: i32,

    /// TMDB identifier (digits only)
    pub tmdb_id: String,
}

/// Media to scrape, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScrapeMedia {
    /// A feature film
    #[serde(rename_all = "camelCase")]
    Movie {
        title: String,
        release_year: u32,
        tmdb_id: String,
    },

    /// A single episode of a series
    #[serde(rename_all = "camelCase")]
    Show {
        title: String,
        release_year: u32,
        tmdb_id: String,
        episode: MediaPart,
        season: MediaPart,
    },
}

impl ScrapeMedia {
    /// Title shared by both variants
    pub fn title(&self) -> &str {
        match self {
            ScrapeMedia::Movie { title, .. } | ScrapeMedia::Show { title, .. } => title,
        }
    }

    /// Release year shared by both variants
    pub fn release_year(&self) -> u32 {
        match self {
            ScrapeMedia::Movie { release_year, .. } | ScrapeMedia::Show { release_year, .. } => {
                *release_year
            }
        }
    }

    /// TMDB id of the movie or series
    pub fn tmdb_id(&self) -> &str {
        match self {
            ScrapeMedia::Movie { tmdb_id, .. } | ScrapeMedia::Show { tmdb_id, .. } => tmdb_id,
        }
    }

    /// Lowercase discriminant as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeMedia::Movie { .. } => "movie",
            ScrapeMedia::Show { .. } => "show",
        }
    }
}

/// A single embed previously discovered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Embed scraper id
    pub id: String,

    /// Embed page URL
    pub url: String,
}

/// Scrape request targeting one specific source scraper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRequest {
    /// Source scraper id
    pub id: String,

    /// Media to look up on that source
    #[serde(flatten)]
    pub media: ScrapeMedia,
}
