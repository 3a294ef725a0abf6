//! Progress bus: typed lifecycle events the pipeline pushes into a sink
//!
//! The sink is fire-and-forget. It is called synchronously at well-defined
//! lifecycle points, is never awaited, and must not panic. Events are
//! transient and never persisted.

use crate::types::TranscriptSource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle notifications emitted while a request runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressEvent {
    /// Page fetch started
    FetchStart { url: String },
    /// Page fetch byte progress
    FetchProgress {
        bytes_downloaded: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },
    /// Page fetch finished
    FetchDone { bytes_downloaded: u64 },
    /// Transcript resolution started
    TranscriptStart { url: String },
    /// Transcript resolution finished
    TranscriptDone {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<TranscriptSource>,
    },
    /// Media download started
    DownloadStart { url: String },
    /// Media download byte progress
    DownloadProgress {
        bytes_downloaded: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },
    /// Media download finished
    DownloadDone { bytes_downloaded: u64 },
    /// Speech-to-text started on a backend
    SpeechToTextStart {
        provider: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_seconds: Option<u64>,
    },
    /// Speech-to-text still running
    SpeechToTextProgress { provider: String },
    /// Managed scrape fallback started
    ScrapeFallbackStart { url: String },
    /// Managed scrape fallback finished
    ScrapeFallbackDone { succeeded: bool },
    /// Social-post reader started
    SocialReaderStart { url: String },
    /// Social-post reader finished
    SocialReaderDone { succeeded: bool },
}

/// Fire-and-forget sink for [`ProgressEvent`]s
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Push an event into an optional sink
pub(crate) fn emit(sink: Option<&ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        sink(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_into_sink() {
        let seen: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |event| {
            seen_clone.lock().unwrap().push(event);
        });

        emit(
            Some(&sink),
            ProgressEvent::FetchStart {
                url: "https://example.com".into(),
            },
        );
        emit(
            Some(&sink),
            ProgressEvent::FetchProgress {
                bytes_downloaded: 1024,
                total_bytes: Some(4096),
            },
        );
        emit(None, ProgressEvent::FetchDone { bytes_downloaded: 0 });

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::FetchStart { .. }));
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = ProgressEvent::FetchProgress {
            bytes_downloaded: 10,
            total_bytes: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fetch-progress");
        assert_eq!(json["bytes_downloaded"], 10);
    }
}
