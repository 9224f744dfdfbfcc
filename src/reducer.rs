//! Reduction of a model response stream into a single completion.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, ClaudeResponse};
use crate::options::StreamingFunc;
use crate::transport::{EventSource, ResponseStreamEvent};
use crate::Error;

/// Drain an event source in delivery order, decoding each chunk, feeding the
/// per-chunk callback, and concatenating the completion text.
///
/// A malformed chunk invalidates the whole stream: the reduction aborts with
/// the decode error and no partial result is returned. Unknown event variants
/// are skipped; they represent forward-compatible protocol extension, not
/// corruption. A callback error likewise aborts the stream.
pub async fn process_streaming_output(
    mut source: EventSource,
    streaming_func: Option<Arc<StreamingFunc>>,
    cancel: &CancellationToken,
) -> Result<ClaudeResponse, Error> {
    let mut combined = String::new();

    loop {
        // `biased` so a token cancelled from inside the callback wins over an
        // already-buffered next event.
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = source.next() => next,
        };

        let Some(event) = next else {
            break;
        };

        match event? {
            ResponseStreamEvent::Chunk(bytes) => {
                let chunk = codec::decode(&bytes)?;
                if let Some(func) = &streaming_func {
                    func(chunk.completion.as_bytes())?;
                }
                combined.push_str(&chunk.completion);
            }
            ResponseStreamEvent::Unknown { tag } => {
                tracing::warn!(%tag, "skipping unknown stream event");
            }
            ResponseStreamEvent::Unrecognized => {
                tracing::debug!("skipping unrecognized stream event");
            }
        }
    }

    Ok(ClaudeResponse {
        completion: combined,
    })
}
