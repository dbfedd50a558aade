//! # Server-Sent Events Transport
//!
//! Opens `GET {endpoint}/stream?agent={identity}&contract=` and yields the
//! `data` payload of every SSE message.

use crate::ports::{FrameStream, StreamTransport};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use shared_types::{StreamTarget, TransportError};
use std::time::Duration;
use tracing::debug;

/// Path of the push stream relative to the server endpoint.
pub const STREAM_PATH: &str = "/stream";

/// SSE transport over reqwest.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
}

impl SseTransport {
    /// Create a transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Full stream URL for a target.
    pub fn stream_url(target: &StreamTarget) -> String {
        format!(
            "{}{}?agent={}&contract=",
            target.endpoint.trim_end_matches('/'),
            STREAM_PATH,
            target.identity
        )
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&self, target: &StreamTarget) -> Result<FrameStream, TransportError> {
        let url = Self::stream_url(target);
        debug!(url = %url, "Opening event stream");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let frames = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => Ok(event.data),
                Err(e) => Err(TransportError::Stream(e.to_string())),
            });
        Ok(frames.boxed())
    }
}
