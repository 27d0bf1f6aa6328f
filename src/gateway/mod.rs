//! Backend gateway: model answers, embeddings, structured classification.
//!
//! The core never talks HTTP directly; it goes through the trait seams
//! below. `OllamaAdapter` implements all three against one host. Tests
//! substitute mock implementations.

pub mod error;
pub mod ollama;
pub mod types;
pub mod usage;

use async_trait::async_trait;

pub use error::GatewayError;
pub use ollama::OllamaAdapter;
pub use types::*;
pub use usage::{BackendCallRecord, CallStatus, NoopUsageSink, StderrUsageSink, UsageSink};

/// Answer-generating model backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask `model` to answer `prompt`.
    ///
    /// The backing model is instructed to emit strictly a JSON object
    /// `{"answer": string, "self_confidence": number}`; the confidence is
    /// clamped to [0, 1] on receipt. Malformed JSON is a hard failure.
    async fn answer(
        &self,
        model: &ModelRef,
        prompt: &str,
        attribution: &Attribution,
    ) -> Result<ModelAnswer, GatewayError>;

    /// Token-level generation with per-token log-probabilities.
    ///
    /// Never fails: errors are reported in the result's `error` field with
    /// empty `text`/`per_token`.
    async fn answer_with_tokens(
        &self,
        model: &ModelRef,
        prompt: &str,
        max_tokens: u32,
        top_k: u32,
        attribution: &Attribution,
    ) -> TokenGeneration;
}

/// Embedding backend.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embed `text` under `model`. Fails if the backend returns no
    /// embedding vector.
    async fn embed(
        &self,
        text: &str,
        model: &EmbedModelRef,
        attribution: &Attribution,
    ) -> Result<Vec<f64>, GatewayError>;
}

/// Structured-output LLM call used by the alignment classifier and the
/// fact-check query former.
#[async_trait]
pub trait StructuredClassifier: Send + Sync {
    /// Run one system+user call and return the raw response content.
    /// The caller owns parsing; parse failure is a fallible boundary
    /// there, not here.
    async fn classify(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        attribution: &Attribution,
    ) -> Result<String, GatewayError>;
}
