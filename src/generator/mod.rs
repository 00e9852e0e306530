//! Generator service abstraction.
//!
//! The pipeline only depends on the [`Generator`] trait. [`GeneratorClient`]
//! talks to an HTTP service with an `/api/generate` + `/api/tags` interface;
//! tests substitute scripted implementations.

mod client;
mod error;
pub mod stream;

pub use client::{choose_model, GeneratorClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::GeneratorError;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::context::ContextSnapshot;

/// Outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// Generated text (partial if `complete` is false).
    pub text: String,
    /// Error description when `success` is false.
    pub error: Option<String>,
    /// False if the stream was cancelled before it finished.
    pub complete: bool,
}

impl GeneratorResponse {
    /// A finished response.
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            error: None,
            complete: true,
        }
    }

    /// A response cut short by cancellation.
    pub fn cancelled(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            error: None,
            complete: false,
        }
    }
}

impl From<GeneratorError> for GeneratorResponse {
    fn from(error: GeneratorError) -> Self {
        Self {
            success: false,
            text: String::new(),
            error: Some(error.to_string()),
            complete: false,
        }
    }
}

/// A text generator driven by the pipeline.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Probes whether the service answers.
    async fn is_available(&self) -> bool;

    /// Names of the models the service offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or answers garbage.
    async fn list_models(&self) -> Result<Vec<String>, GeneratorError>;

    /// Model used for generation.
    fn model(&self) -> &str;

    /// Selects the model used for generation.
    fn set_model(&mut self, name: &str);

    /// Generates a complete reply to `prompt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is unusable.
    async fn generate(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
    ) -> Result<GeneratorResponse, GeneratorError>;

    /// Generates a reply, passing each fragment to `on_chunk` as it arrives.
    ///
    /// Cancellation is checked before the request is issued and between
    /// fragments. A cancelled stream returns the text received so far with
    /// `complete` set to false.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service reports one.
    async fn generate_streaming(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
        on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<GeneratorResponse, GeneratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_converts_to_failed_response() {
        let response = GeneratorResponse::from(GeneratorError::service("boom"));
        assert!(!response.success);
        assert!(!response.complete);
        assert_eq!(response.error.as_deref(), Some("generator error: boom"));
    }

    #[test]
    fn cancelled_response_keeps_text() {
        let response = GeneratorResponse::cancelled("add ");
        assert!(response.success);
        assert!(!response.complete);
        assert_eq!(response.text, "add ");
    }
}
