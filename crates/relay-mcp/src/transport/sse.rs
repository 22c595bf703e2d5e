//! Legacy MCP-over-SSE client transport.
//!
//! The server streams JSON-RPC messages as `message` events on a long-lived
//! GET. Its first event, `endpoint`, names the URL client messages are POSTed
//! to.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Sink, Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::AbortOnDropHandle;
use url::Url;

const INBOUND_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("event stream error: {0}")]
    Stream(String),

    #[error("event stream ended before the endpoint event")]
    MissingEndpoint,
}

pub type SseSink = Pin<Box<dyn Sink<ClientJsonRpcMessage, Error = SseError> + Send>>;

/// Inbound server messages. Dropping it stops the background reader.
pub struct SseStream {
    inner: ReceiverStream<ServerJsonRpcMessage>,
    _reader: AbortOnDropHandle<()>,
}

impl Stream for SseStream {
    type Item = ServerJsonRpcMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// A connected SSE channel pair.
pub struct SseChannel {
    endpoint: Url,
    sink: SseSink,
    stream: SseStream,
}

impl std::fmt::Debug for SseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseChannel")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl SseChannel {
    /// Open the event stream and wait for the `endpoint` event.
    ///
    /// # Errors
    ///
    /// Returns `SseError` if the URL is invalid, the GET fails or returns a
    /// non-success status, or the stream ends before announcing an endpoint.
    pub async fn connect(url: &str) -> Result<Self, SseError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::connect_with(client, url).await
    }

    /// # Errors
    ///
    /// See [`SseChannel::connect`].
    pub async fn connect_with(client: reqwest::Client, url: &str) -> Result<Self, SseError> {
        let base = Url::parse(url)?;
        let response = client
            .get(base.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SseError::Status(response.status().as_u16()));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let endpoint = loop {
            match events.next().await {
                Some(Ok(event)) if event.event == "endpoint" => {
                    break base.join(event.data.trim())?;
                }
                Some(Ok(event)) => {
                    tracing::debug!(event = %event.event, "ignoring SSE event before endpoint");
                }
                Some(Err(e)) => return Err(SseError::Stream(e.to_string())),
                None => return Err(SseError::MissingEndpoint),
            }
        };
        tracing::debug!(endpoint = %endpoint, "SSE endpoint announced");

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let reader = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "message" => {
                        match serde_json::from_str::<ServerJsonRpcMessage>(&event.data) {
                            Ok(message) => {
                                if tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!("dropping malformed SSE message: {e}"),
                        }
                    }
                    Ok(event) => {
                        tracing::debug!(event = %event.event, "ignoring SSE event");
                    }
                    Err(e) => {
                        tracing::warn!("SSE stream failed: {e}");
                        break;
                    }
                }
            }
            tracing::debug!("SSE stream closed");
        });

        let sink = futures::sink::unfold(
            (client, endpoint.clone()),
            |(client, endpoint), message: ClientJsonRpcMessage| async move {
                let response = client
                    .post(endpoint.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .json(&message)
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(SseError::Status(response.status().as_u16()));
                }
                Ok::<_, SseError>((client, endpoint))
            },
        );

        Ok(Self {
            endpoint,
            sink: Box::pin(sink),
            stream: SseStream {
                inner: ReceiverStream::new(rx),
                _reader: AbortOnDropHandle::new(reader),
            },
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Split into the `(sink, stream)` pair handed to the MCP service.
    #[must_use]
    pub fn into_parts(self) -> (SseSink, SseStream) {
        (self.sink, self.stream)
    }
}
