//! Error types for the link preview pipeline

use thiserror::Error;

/// Errors surfaced to callers of [`LinkPreview::preview`](crate::LinkPreview::preview)
///
/// Only top-level page failures are fatal. Transcript-provider failures are
/// soft: they advance the provider chain and end up in diagnostics, never here.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// URL is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Top-level page fetch timed out
    #[error("Page fetch timed out")]
    FetchTimeout,

    /// Top-level page fetch returned a non-2xx status
    #[error("Page fetch failed with status {0}")]
    FetchFailed(u16),

    /// The response body is not something we can extract text from
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    Connect(#[source] reqwest::Error),

    /// Other request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Local file could not be read
    #[error("Failed to read local file: {0}")]
    FileRead(#[source] std::io::Error),
}

impl PreviewError {
    /// Classify a reqwest error into the preview taxonomy
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PreviewError::FetchTimeout
        } else if err.is_connect() {
            PreviewError::Connect(err)
        } else {
            PreviewError::Request(err.to_string())
        }
    }
}

/// Soft failures inside a transcript provider
///
/// Never escapes the chain: the engine converts these into a null-text
/// [`ProviderResult`](crate::transcript::ProviderResult) with a note.
/// `Unavailable` means the provider was never in a position to try (missing
/// key or binary); `Failed` means it tried and errored. Diagnostics keep the
/// two apart.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is not configured (missing credentials or binary)
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider was attempted and failed
    #[error("provider failed: {0}")]
    Failed(String),
}
