//! The Claude generation facade over the Bedrock runtime transport.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::callbacks::CallbackHandler;
use crate::codec::{self, ClaudeRequest, ClaudeResponse};
use crate::options::CallOptions;
use crate::reducer::process_streaming_output;
use crate::transport::{BedrockRuntime, BedrockRuntimeClient};
use crate::Error;

/// Default model when none is configured.
/// https://docs.aws.amazon.com/bedrock/latest/userguide/model-ids-arns.html
pub const CLAUDE_V2_MODEL_ID: &str = "anthropic.claude-v2";

/// Role markers the Claude protocol requires around a raw prompt. Omitting
/// them produces protocol-invalid requests, so framing is on by default.
fn frame_prompt(prompt: &str) -> String {
    format!("\n\nHuman:{prompt}\n\nAssistant:")
}

/// One normalized generation returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
}

/// A generic language-model capability: batch generation plus a single-prompt
/// convenience wrapper.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate completions for a prompt batch.
    ///
    /// Known limitation carried from the underlying protocol: only the first
    /// prompt in the batch is sent; one generation comes back per call.
    async fn generate(
        &self,
        prompts: &[String],
        options: CallOptions,
    ) -> Result<Vec<Generation>, Error>;

    /// Generate for a single prompt and return its text. Fails with
    /// [`Error::EmptyResponse`] if no generation was produced.
    async fn call(&self, prompt: &str, options: CallOptions) -> Result<String, Error> {
        let generations = self.generate(&[prompt.to_string()], options).await?;
        match generations.into_iter().next() {
            Some(generation) => Ok(generation.text),
            None => Err(Error::EmptyResponse),
        }
    }
}

/// Claude text generation over Bedrock.
///
/// Configuration is fixed at construction; a single instance is safe to share
/// across concurrent `generate` calls.
pub struct Claude {
    transport: Arc<dyn BedrockRuntime>,
    model_id: String,
    use_human_assistant_prompt: bool,
    callbacks: Option<Arc<dyn CallbackHandler>>,
}

impl Claude {
    /// Create an adapter for the given region with default settings.
    pub fn new(region: &str) -> Result<Self, Error> {
        Self::builder(region).build()
    }

    /// Start building an adapter for the given region.
    pub fn builder(region: &str) -> ClaudeBuilder {
        ClaudeBuilder {
            region: region.to_string(),
            base_url: None,
            bearer_token: None,
            model_id: None,
            use_human_assistant_prompt: true,
            transport: None,
            callbacks: None,
        }
    }

    /// Rough token count for `text`. This is a coarse stand-in (about four
    /// characters per token), not an exact tokenizer.
    pub fn num_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn build_request(&self, prompt: &str, options: &CallOptions) -> ClaudeRequest {
        let prompt = if self.use_human_assistant_prompt {
            frame_prompt(prompt)
        } else {
            prompt.to_string()
        };

        ClaudeRequest {
            prompt,
            max_tokens_to_sample: options.max_tokens.unwrap_or(CallOptions::DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
            stop_sequences: options.stop_sequences.clone(),
        }
    }

    async fn invoke_buffered(
        &self,
        payload: bytes::Bytes,
        cancel: &CancellationToken,
    ) -> Result<ClaudeResponse, Error> {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.transport.invoke_model(&self.model_id, payload) => result?,
        };
        codec::decode(&body)
    }

    async fn invoke_streaming(
        &self,
        payload: bytes::Bytes,
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<ClaudeResponse, Error> {
        let source = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self
                .transport
                .invoke_model_with_response_stream(&self.model_id, payload) => result?,
        };
        process_streaming_output(source, options.streaming_func.clone(), cancel).await
    }
}

#[async_trait::async_trait]
impl LanguageModel for Claude {
    async fn generate(
        &self,
        prompts: &[String],
        options: CallOptions,
    ) -> Result<Vec<Generation>, Error> {
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_llm_start(prompts);
        }

        let prompt = prompts
            .first()
            .ok_or_else(|| Error::config("at least one prompt is required"))?;

        let request = self.build_request(prompt, &options);
        let payload = codec::encode(&request)?;

        let cancel = options
            .cancellation_token
            .clone()
            .unwrap_or_default();

        let response = if options.streaming_func.is_some() {
            self.invoke_streaming(payload, &options, &cancel).await?
        } else {
            self.invoke_buffered(payload, &cancel).await?
        };

        // The protocol returns exactly one candidate per call.
        let generations = vec![Generation {
            text: response.completion,
        }];

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_llm_end(&generations);
        }

        Ok(generations)
    }
}

/// Builder for [`Claude`]; overrides are applied in the order given.
pub struct ClaudeBuilder {
    region: String,
    base_url: Option<String>,
    bearer_token: Option<String>,
    model_id: Option<String>,
    use_human_assistant_prompt: bool,
    transport: Option<Arc<dyn BedrockRuntime>>,
    callbacks: Option<Arc<dyn CallbackHandler>>,
}

impl ClaudeBuilder {
    /// Override the model identifier (default [`CLAUDE_V2_MODEL_ID`]).
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Send prompts unframed instead of wrapping them in the Human/Assistant
    /// markers. Only useful with prompts that already carry their own framing.
    pub fn raw_prompt(mut self) -> Self {
        self.use_human_assistant_prompt = false;
        self
    }

    /// Bearer token attached to runtime requests.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Point the client at a custom runtime endpoint (for testing).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Use an already-configured transport instead of constructing one from
    /// the region. Region and endpoint settings are ignored when set.
    pub fn transport(mut self, transport: Arc<dyn BedrockRuntime>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach lifecycle hooks fired around each generate call.
    pub fn callbacks(mut self, callbacks: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn build(self) -> Result<Claude, Error> {
        let transport: Arc<dyn BedrockRuntime> = match self.transport {
            Some(transport) => transport,
            None => {
                if let Some(base_url) = self.base_url {
                    Arc::new(BedrockRuntimeClient::with_base_url(
                        base_url,
                        self.bearer_token,
                    )?)
                } else {
                    if self.region.is_empty() {
                        return Err(Error::config("empty region"));
                    }
                    Arc::new(BedrockRuntimeClient::new(&self.region, self.bearer_token)?)
                }
            }
        };

        Ok(Claude {
            transport,
            model_id: self.model_id.unwrap_or_else(|| CLAUDE_V2_MODEL_ID.to_string()),
            use_human_assistant_prompt: self.use_human_assistant_prompt,
            callbacks: self.callbacks,
        })
    }
}
