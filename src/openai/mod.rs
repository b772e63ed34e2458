pub mod client;
pub mod image;
pub mod normalize;
pub mod story;

pub use client::OpenAiClient;
pub use image::{ImageError, ImageGenerator};
pub use story::{StoryDraft, StoryGenerator};

use thiserror::Error;

/// Failure kinds for the completion API. Raw reqwest/provider errors never
/// leave this module.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("authentication with the model API failed")]
    Auth,
    #[error("model API rate limit exceeded")]
    RateLimit,
    #[error("model API request timed out")]
    Timeout,
    #[error("model API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed model API response: {0}")]
    MalformedResponse(String),
    #[error("network error reaching the model API: {0}")]
    Network(String),
}

impl From<crate::auth::AuthError> for GenerationError {
    fn from(_: crate::auth::AuthError) -> Self {
        GenerationError::Auth
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if e.is_decode() {
            GenerationError::MalformedResponse(e.to_string())
        } else {
            GenerationError::Network(e.to_string())
        }
    }
}
