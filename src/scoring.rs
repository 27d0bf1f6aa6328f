//! Dual-model confidence scoring.
//!
//! Pipeline for one request:
//! 1. Fan the prompt out to both model backends concurrently and join.
//! 2. Embed both answers concurrently and join.
//! 3. Agreement = cosine similarity of the two embeddings.
//! 4. Per-model blended confidence = weight * agreement + (1 - weight) * self,
//!    clamped to [0, 1] and scaled to an integer percentage.
//! 5. Strictly-greater percentage wins; an exact tie goes to model A.
//!
//! Any model or embedding failure is fatal to the request: partial
//! results are never scored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{
    Attribution, EmbedModelRef, EmbeddingGateway, GatewayError, ModelGateway, ModelRef,
};

/// Default weight given to agreement over self-reported confidence.
pub const DEFAULT_WEIGHT_AGREEMENT: f64 = 0.6;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum ScoreError {
    /// Request rejected before any backend call was attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A model or embedding call failed; the request cannot be scored.
    #[error("upstream failure: {0}")]
    Upstream(#[from] GatewayError),
}

// =============================================================================
// REQUEST / RESULT
// =============================================================================

/// Immutable description of one scoring run.
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    prompt: String,
    pub model_a: ModelRef,
    pub model_b: ModelRef,
    pub embed_model: EmbedModelRef,
    /// Weight of agreement in the blend, clamped to [0, 1].
    pub weight_agreement: f64,
}

impl ScoringRequest {
    /// Build a request. Fails with a validation error when the prompt is
    /// empty after trimming.
    pub fn new(
        prompt: impl Into<String>,
        model_a: ModelRef,
        model_b: ModelRef,
        embed_model: EmbedModelRef,
    ) -> Result<Self, ScoreError> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(ScoreError::Validation("prompt is empty".into()));
        }
        Ok(Self {
            prompt,
            model_a,
            model_b,
            embed_model,
            weight_agreement: DEFAULT_WEIGHT_AGREEMENT,
        })
    }

    /// Override the agreement weight, clamped to [0, 1].
    pub fn with_weight_agreement(mut self, weight: f64) -> Self {
        self.weight_agreement = weight.clamp(0.0, 1.0);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Outcome of one scoring run, computed fresh per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Cosine similarity of the two answer embeddings; may be negative.
    pub agreement: f64,
    /// Agreement as an integer percentage of the clamped value.
    pub agreement_pct: u32,
    pub a_conf_pct: u32,
    pub b_conf_pct: u32,
    /// Whichever model has the strictly greater percentage; model A on ties.
    pub best_model: ModelRef,
    pub best_answer: String,
    /// The winning model's blended percentage.
    pub final_confidence_pct: u32,
}

// =============================================================================
// AGREEMENT MATH
// =============================================================================

/// Cosine similarity in [-1, 1]. Returns exactly 0.0 when either vector
/// has zero L2 norm, never a division fault.
pub fn cosine(u: &[f64], v: &[f64]) -> f64 {
    let dot: f64 = u.iter().zip(v).map(|(a, b)| a * b).sum();
    let norm_u = u.iter().map(|a| a * a).sum::<f64>().sqrt();
    let norm_v = v.iter().map(|b| b * b).sum::<f64>().sqrt();
    let denom = norm_u * norm_v;
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Clamp to [0, 1], scale to [0, 100], round to the nearest integer
/// (ties round half up).
pub fn percent_of(x: f64) -> u32 {
    (x.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Weighted blend of agreement and self-reported confidence.
pub fn blend(weight_agreement: f64, agreement: f64, self_confidence: f64) -> f64 {
    weight_agreement * agreement + (1.0 - weight_agreement) * self_confidence
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Score one request.
///
/// The two answer calls run concurrently; neither may observe the
/// other's result, and if one fails the other is cancelled with it.
/// The two embedding calls likewise run concurrently and must both
/// complete before agreement is computed.
pub async fn score(
    models: &dyn ModelGateway,
    embeddings: &dyn EmbeddingGateway,
    request: &ScoringRequest,
    attribution: &Attribution,
) -> Result<ScoringResult, ScoreError> {
    let prompt = request.prompt();
    if prompt.is_empty() {
        return Err(ScoreError::Validation("prompt is empty".into()));
    }

    let (answer_a, answer_b) = tokio::try_join!(
        models.answer(&request.model_a, prompt, attribution),
        models.answer(&request.model_b, prompt, attribution),
    )?;

    let (embed_a, embed_b) = tokio::try_join!(
        embeddings.embed(&answer_a.text, &request.embed_model, attribution),
        embeddings.embed(&answer_b.text, &request.embed_model, attribution),
    )?;

    let agreement = cosine(&embed_a, &embed_b);
    let agreement_pct = percent_of(agreement);

    let w = request.weight_agreement;
    let a_conf_pct = percent_of(blend(w, agreement, answer_a.self_confidence));
    let b_conf_pct = percent_of(blend(w, agreement, answer_b.self_confidence));

    // Strictly greater wins; an exact tie resolves to model A.
    let (best_model, best_answer, final_confidence_pct) = if b_conf_pct > a_conf_pct {
        (request.model_b.clone(), answer_b.text, b_conf_pct)
    } else {
        (request.model_a.clone(), answer_a.text, a_conf_pct)
    };

    Ok(ScoringResult {
        agreement,
        agreement_pct,
        a_conf_pct,
        b_conf_pct,
        best_model,
        best_answer,
        final_confidence_pct,
    })
}
