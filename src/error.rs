use thiserror::Error;

/// Errors that can occur when using the bedrock-claude library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bedrock returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Error::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }
}
