//! Terminal chain member
//!
//! Matches everything and never produces text, so every chain ends with a
//! structured "not implemented" result instead of running empty.

use super::{ProviderContext, ProviderResult, TranscriptProvider};
use crate::types::SourceKind;
use async_trait::async_trait;
use url::Url;

/// Always-matching, never-succeeding provider
pub struct FallbackProvider;

#[async_trait]
impl TranscriptProvider for FallbackProvider {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn can_handle(&self, _url: &Url, _kind: SourceKind) -> bool {
        true
    }

    async fn fetch_transcript(&self, _url: &Url, _ctx: &ProviderContext) -> ProviderResult {
        ProviderResult::skip("transcript resolution not implemented for this source")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fallback_matches_everything_and_yields_nothing() {
        let provider = FallbackProvider;
        let url = Url::parse("https://example.com/whatever").unwrap();
        assert!(provider.can_handle(&url, SourceKind::Generic));
        assert!(provider.can_handle(&url, SourceKind::VideoPlatform));

        let ctx = ProviderContext::new(reqwest::Client::new(), Duration::from_secs(1));
        let result = provider.fetch_transcript(&url, &ctx).await;
        assert!(result.text.is_none());
        assert!(result.note.is_some());
    }
}
