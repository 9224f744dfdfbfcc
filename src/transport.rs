//! Transport layer for the Bedrock runtime invoke operations.

use std::pin::Pin;
use std::time::Duration;

use base64::Engine as _;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;

use crate::codec::CONTENT_TYPE_JSON;
use crate::sse_stream::{SseEvent, SseStream};
use crate::Error;

/// One event delivered on a model response stream.
///
/// Only `Chunk` carries a decodable payload. The other arms exist so that
/// provider-internal event kinds the client does not understand yet can be
/// skipped instead of failing the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStreamEvent {
    /// A completion chunk; the bytes are a JSON body in the response schema.
    Chunk(Bytes),
    /// A tagged event kind this client does not recognize.
    Unknown { tag: String },
    /// An event with no usable shape at all.
    Unrecognized,
}

/// Lazily produced stream of response events, open until the provider closes
/// the connection.
pub type EventSource = Pin<Box<dyn Stream<Item = Result<ResponseStreamEvent, Error>> + Send>>;

/// The two Bedrock runtime operations the adapter needs.
///
/// Modeled as a trait so tests can substitute scripted transports for the
/// real HTTP client.
#[async_trait::async_trait]
pub trait BedrockRuntime: Send + Sync {
    /// Single request/response invoke; returns the full response body.
    async fn invoke_model(&self, model_id: &str, body: Bytes) -> Result<Bytes, Error>;

    /// Streaming invoke; returns an event source that yields chunks until
    /// the provider closes the stream.
    async fn invoke_model_with_response_stream(
        &self,
        model_id: &str,
        body: Bytes,
    ) -> Result<EventSource, Error>;
}

/// HTTP client for the Bedrock runtime endpoints in one region.
///
/// Credential resolution stays outside this crate: the client sends a
/// pre-resolved bearer token when one is configured, and callers needing
/// request signing can inject their own [`BedrockRuntime`] instead.
pub struct BedrockRuntimeClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl BedrockRuntimeClient {
    /// Create a client for the given AWS region.
    pub fn new(region: &str, bearer_token: Option<String>) -> Result<Self, Error> {
        if region.is_empty() {
            return Err(Error::config("empty region"));
        }
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: format!("https://bedrock-runtime.{region}.amazonaws.com"),
            bearer_token,
        })
    }

    /// Create a client against a custom base URL (for testing).
    pub fn with_base_url(base_url: String, bearer_token: Option<String>) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    fn endpoint(&self, model_id: &str, stream: bool) -> String {
        let operation = if stream {
            "invoke-with-response-stream"
        } else {
            "invoke"
        };
        format!("{}/model/{}/{}", self.base_url, model_id, operation)
    }

    async fn send(&self, url: &str, body: Bytes) -> Result<reqwest::Response, Error> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(reqwest::header::ACCEPT, CONTENT_TYPE_JSON)
            .body(body);

        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::provider(status.as_u16(), message));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl BedrockRuntime for BedrockRuntimeClient {
    async fn invoke_model(&self, model_id: &str, body: Bytes) -> Result<Bytes, Error> {
        let url = self.endpoint(model_id, false);
        tracing::debug!(%model_id, "invoking model");

        let response = self.send(&url, body).await?;
        Ok(response.bytes().await?)
    }

    async fn invoke_model_with_response_stream(
        &self,
        model_id: &str,
        body: Bytes,
    ) -> Result<EventSource, Error> {
        let url = self.endpoint(model_id, true);
        tracing::debug!(%model_id, "invoking model with response stream");

        let response = self.send(&url, body).await?;
        let events = SseStream::new(response.bytes_stream())
            .map(|result| result.map(classify_event));

        Ok(Box::pin(events))
    }
}

/// Envelope used by chunk events: the JSON body arrives base64-encoded under
/// a `bytes` field.
#[derive(Deserialize)]
struct ChunkEnvelope {
    bytes: String,
}

/// Map a raw SSE event onto the response-stream union.
fn classify_event(event: SseEvent) -> ResponseStreamEvent {
    match event.event_type.as_deref() {
        Some("chunk") => {
            if let Ok(envelope) = serde_json::from_str::<ChunkEnvelope>(&event.data) {
                match base64::engine::general_purpose::STANDARD.decode(envelope.bytes) {
                    Ok(decoded) => ResponseStreamEvent::Chunk(decoded.into()),
                    Err(_) => ResponseStreamEvent::Unrecognized,
                }
            } else {
                // Some surfaces deliver the chunk body directly, unwrapped.
                ResponseStreamEvent::Chunk(Bytes::from(event.data))
            }
        }
        Some(tag) => ResponseStreamEvent::Unknown {
            tag: tag.to_string(),
        },
        None => ResponseStreamEvent::Unrecognized,
    }
}
