//! Engine error types

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors raised by an engine invocation or reported inside progress events
#[derive(Debug, Error)]
pub enum EngineError {
    /// The provider has nothing for this media
    #[error("Not found: {0}")]
    NotFound(String),

    /// An outbound request made by a scraper failed
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A scraper failed while extracting
    #[error("Scraper {id} failed: {message}")]
    Scraper { id: String, message: String },

    /// Requested scraper id is not registered
    #[error("Unknown scraper: {0}")]
    UnknownScraper(String),

    /// The consumer went away before the invocation finished
    #[error("Invocation cancelled")]
    Cancelled,

    /// Anything else
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable error class name, used when the error is flattened for clients
    pub fn name(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NotFoundError",
            EngineError::Fetch(_) => "FetchError",
            EngineError::Scraper { .. } => "ScraperError",
            EngineError::UnknownScraper(_) => "UnknownScraperError",
            EngineError::Cancelled => "CancelledError",
            EngineError::Internal(_) => "InternalError",
        }
    }

    /// True for the "provider has nothing" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
