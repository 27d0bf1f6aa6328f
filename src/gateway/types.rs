//! Core types for the backend gateway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for usage tracking and debugging.
///
/// Every call through the gateway carries attribution so we know:
/// - Who made the request (user_id)
/// - Which scoring run it belongs to (run_id)
/// - Which code path triggered it (caller)
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// User who initiated the request (if known).
    pub user_id: Option<Uuid>,
    /// Scoring run this call is part of.
    pub run_id: Option<Uuid>,
    /// Which code path made this call, for debugging.
    /// Use a static string like "scoring::answer" or "report::tokens".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

// =============================================================================
// MODEL IDENTIFIERS
// =============================================================================

/// Identifier of a generation model on the backend, e.g. "gemma2:2b".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef(pub String);

impl ModelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an embedding model, e.g. "nomic-embed-text".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbedModelRef(pub String);

impl EmbedModelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmbedModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ANSWER TYPES
// =============================================================================

/// One model's answer to a prompt, with its self-reported confidence.
///
/// Owned by the orchestrator for the duration of one scoring request;
/// never mutated after receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnswer {
    /// The answer text, trimmed.
    pub text: String,
    /// Self-reported confidence, clamped to [0, 1] on receipt.
    pub self_confidence: f64,
}

impl ModelAnswer {
    /// Build an answer, trimming the text and clamping the confidence.
    pub fn new(text: impl Into<String>, self_confidence: f64) -> Self {
        Self {
            text: text.into().trim().to_string(),
            self_confidence: self_confidence.clamp(0.0, 1.0),
        }
    }
}

// =============================================================================
// TOKEN-LEVEL TYPES
// =============================================================================

/// A single output token with its log-probability and alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLogprob {
    /// The token string.
    pub token: String,
    /// Log-probability of this token.
    pub logprob: f64,
    /// `exp(logprob)`, computed on receipt.
    pub prob: f64,
    /// Top alternative tokens at this position, most probable first.
    pub topk: Vec<TokenAlternative>,
}

/// An alternative token at a given position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAlternative {
    pub token: String,
    pub logprob: f64,
    pub prob: f64,
}

/// Result of a token-level generation call.
///
/// This call never fails: backend errors populate `error` and leave
/// `text` and `per_token` empty, so callers can always assemble a
/// degraded-but-well-formed export payload.
#[derive(Debug, Clone, Default)]
pub struct TokenGeneration {
    /// Generated text, empty on failure.
    pub text: String,
    /// Per-token log-probabilities, in generation order.
    pub per_token: Vec<TokenLogprob>,
    /// Description of the failure, if the call did not succeed.
    pub error: Option<String>,
}

impl TokenGeneration {
    /// A failed generation carrying only the error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
