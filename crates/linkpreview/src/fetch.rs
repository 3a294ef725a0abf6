//! HTML fetcher: timeout-bounded streaming GET with byte progress
//!
//! Streams the body so progress events carry cumulative downloaded bytes
//! (and the total, when a Content-Length header is present). Redirects are
//! followed by the client; the final URL is reported back because every
//! downstream extraction and transcript key must use the resolved location.

use crate::error::PreviewError;
use crate::progress::{emit, ProgressEvent, ProgressSink};
use crate::DEFAULT_USER_AGENT;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Content types the fetcher will hand to the extractor
const TEXTUAL_TYPES: &[&str] = &["text/html", "application/xhtml", "text/plain"];

/// A fetched, decoded page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    /// Decoded body
    pub html: String,
    /// HTTP status
    pub status: u16,
    /// Content-Type header, when present
    pub content_type: Option<String>,
}

/// Build the shared HTTP client used by the whole pipeline
pub fn build_client(user_agent: Option<&str>) -> Result<Client, PreviewError> {
    let mut headers = HeaderMap::new();
    let ua = user_agent.unwrap_or(DEFAULT_USER_AGENT);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(ua).unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html, application/xhtml+xml, text/plain, */*;q=0.8"),
    );

    Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(PreviewError::ClientBuild)
}

/// Fetch a page, streaming the body and emitting progress
///
/// Fatal to the request: a timeout, a non-2xx status, or a non-textual
/// content type all surface as typed errors.
pub async fn fetch_html(
    client: &Client,
    url: &str,
    timeout: Duration,
    sink: Option<&ProgressSink>,
) -> Result<FetchedPage, PreviewError> {
    emit(sink, ProgressEvent::FetchStart { url: url.to_string() });

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(PreviewError::from_reqwest)?;

    let status = response.status();
    let final_url = response.url().to_string();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "page fetch failed");
        return Err(PreviewError::FetchFailed(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    if let Some(ref ct) = content_type {
        let ct_lower = ct.to_lowercase();
        if !TEXTUAL_TYPES.iter().any(|t| ct_lower.starts_with(t)) {
            return Err(PreviewError::UnsupportedContentType(ct.clone()));
        }
    }

    let total_bytes = response.content_length();
    let body = read_body(response, timeout, total_bytes, sink).await?;

    emit(
        sink,
        ProgressEvent::FetchDone {
            bytes_downloaded: body.len() as u64,
        },
    );
    debug!(url = %final_url, bytes = body.len(), "page fetched");

    Ok(FetchedPage {
        final_url,
        html: String::from_utf8_lossy(&body).to_string(),
        status: status.as_u16(),
        content_type,
    })
}

/// Stream the body under a deadline, emitting progress per chunk
async fn read_body(
    response: reqwest::Response,
    timeout: Duration,
    total_bytes: Option<u64>,
    sink: Option<&ProgressSink>,
) -> Result<Vec<u8>, PreviewError> {
    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        body.extend_from_slice(&bytes);
                        emit(
                            sink,
                            ProgressEvent::FetchProgress {
                                bytes_downloaded: body.len() as u64,
                                total_bytes,
                            },
                        );
                    }
                    Some(Err(err)) => {
                        return Err(PreviewError::Request(err.to_string()));
                    }
                    None => return Ok(body),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("body read deadline reached");
                return Err(PreviewError::FetchTimeout);
            }
        }
    }
}
