//! Wire types for the Claude invoke-model schema on Bedrock.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Media type sent with every invoke request.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Request body for the Claude text-completion schema.
///
/// Numeric fields are passed through to the provider unvalidated; Bedrock is
/// the source of truth for range errors. Optional fields are omitted from the
/// wire payload when unset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaudeRequest {
    pub prompt: String,
    pub max_tokens_to_sample: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// Response body for a buffered invoke, and for each streamed chunk.
///
/// Bedrock includes other fields (`stop_reason`, `stop`, ...) which are
/// ignored here; only the completion text is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClaudeResponse {
    pub completion: String,
}

/// Serialize a request into its JSON wire payload.
pub fn encode(request: &ClaudeRequest) -> Result<Bytes, Error> {
    Ok(serde_json::to_vec(request)?.into())
}

/// Parse a response body or stream chunk. Malformed JSON is a hard error and
/// must propagate to the caller.
pub fn decode(body: &[u8]) -> Result<ClaudeResponse, Error> {
    Ok(serde_json::from_slice(body)?)
}
