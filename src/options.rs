//! Per-call generation options.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::Error;

/// Callback invoked with each streamed chunk's completion bytes.
///
/// Returning an error aborts the stream and surfaces that error from the
/// top-level call.
pub type StreamingFunc = dyn Fn(&[u8]) -> Result<(), Error> + Send + Sync;

/// Overrides applied to a single `generate` call. Unset fields are omitted
/// from the request payload and left to provider defaults, except
/// `max_tokens`, which falls back to [`CallOptions::DEFAULT_MAX_TOKENS`].
#[derive(Clone, Default)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub stop_sequences: Vec<String>,
    pub(crate) streaming_func: Option<Arc<StreamingFunc>>,
    pub(crate) cancellation_token: Option<CancellationToken>,
}

impl CallOptions {
    pub const DEFAULT_MAX_TOKENS: u32 = 256;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    /// Request the streaming invoke path and deliver each chunk's completion
    /// bytes to `func` as it arrives, in stream order.
    pub fn with_streaming_func<F>(mut self, func: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.streaming_func = Some(Arc::new(func));
        self
    }

    /// Attach a cancellation token; once cancelled, the in-flight invoke or
    /// stream is aborted and the call returns [`Error::Cancelled`].
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .field("stop_sequences", &self.stop_sequences)
            .field("streaming", &self.streaming_func.is_some())
            .finish()
    }
}
