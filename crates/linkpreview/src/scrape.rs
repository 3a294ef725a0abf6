//! Managed scrape service seam
//!
//! The pipeline only knows this trait; production bindings live outside the
//! crate. A `None` result means the service had nothing for the URL, which is
//! a soft outcome for the selector.

use crate::types::CacheMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Scrape request failed
#[derive(Debug, Error)]
#[error("scrape failed: {0}")]
pub struct ScrapeError(pub String);

/// Metadata the scrape service resolved for a page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
}

/// Output of one managed scrape
///
/// Either field may be absent; the selector prefers `markdown` and falls
/// back to extracting from `html`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub metadata: Option<ScrapedMetadata>,
}

/// Managed scrape fallback
#[async_trait]
pub trait ScrapeService: Send + Sync {
    /// Scrape a URL; `Ok(None)` means the service could not produce a page
    async fn scrape(
        &self,
        url: &str,
        cache_mode: CacheMode,
        timeout: Duration,
    ) -> Result<Option<ScrapedPage>, ScrapeError>;
}
