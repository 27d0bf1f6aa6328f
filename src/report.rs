//! Raw token-level export payloads and final report assembly.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::calibration::CalibrationSnapshot;
use crate::gateway::{Attribution, ModelGateway, ModelRef, TokenLogprob};
use crate::scoring::ScoringResult;

pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_MAX_TOKENS: u32 = 256;

// =============================================================================
// BINARY PROBABILITIES
// =============================================================================

/// Yes/no probability pair derived from a final confidence percentage.
/// The two values sum to 1 by construction (subject to 6-decimal rounding
/// of the no side). Serializes as `{<yes_label>: p, <no_label>: 1-p}`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryProbs {
    pub yes_label: String,
    pub no_label: String,
    pub yes: f64,
    pub no: f64,
}

impl BinaryProbs {
    pub fn from_confidence_pct(
        final_confidence_pct: u32,
        yes_label: impl Into<String>,
        no_label: impl Into<String>,
    ) -> Self {
        let yes = (final_confidence_pct as f64 / 100.0).clamp(0.0, 1.0);
        let no = ((1.0 - yes) * 1_000_000.0).round() / 1_000_000.0;
        Self {
            yes_label: yes_label.into(),
            no_label: no_label.into(),
            yes,
            no,
        }
    }
}

impl Serialize for BinaryProbs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.yes_label, &self.yes)?;
        map.serialize_entry(&self.no_label, &self.no)?;
        map.end()
    }
}

// =============================================================================
// RAW EXPORT PAYLOAD
// =============================================================================

/// Options for one raw payload build.
#[derive(Debug, Clone)]
pub struct RawPayloadOptions {
    /// Whether to run the token-level generation call at all.
    pub want_tokens: bool,
    pub yes_label: String,
    pub no_label: String,
    /// Alternatives requested per token position.
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for RawPayloadOptions {
    fn default() -> Self {
        Self {
            want_tokens: true,
            yes_label: "yes".into(),
            no_label: "no".into(),
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Exportable record of one token-level generation run. Transient,
/// assembled per export request.
#[derive(Debug, Clone, Serialize)]
pub struct RawExportPayload {
    pub model: ModelRef,
    pub generated_text: String,
    pub per_token: Vec<TokenLogprob>,
    pub binary_probs: BinaryProbs,
    /// Present when the token-level call failed; the payload is then a
    /// degraded result, not an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Build a raw export payload.
///
/// Never fails: a token-level call failure yields empty
/// `generated_text`/`per_token` plus a `note` describing the failure.
pub async fn build_raw_payload(
    models: &dyn ModelGateway,
    prompt: &str,
    chosen_model: &ModelRef,
    final_confidence_pct: u32,
    options: &RawPayloadOptions,
    attribution: &Attribution,
) -> RawExportPayload {
    let binary_probs = BinaryProbs::from_confidence_pct(
        final_confidence_pct,
        options.yes_label.as_str(),
        options.no_label.as_str(),
    );

    if !options.want_tokens {
        return RawExportPayload {
            model: chosen_model.clone(),
            generated_text: String::new(),
            per_token: Vec::new(),
            binary_probs,
            note: None,
        };
    }

    let generation = models
        .answer_with_tokens(
            chosen_model,
            prompt,
            options.max_tokens,
            options.top_k,
            attribution,
        )
        .await;

    let note = generation.error.map(|e| {
        warn!(error = %e, model = %chosen_model, "Token-level generation failed; exporting degraded payload");
        format!("token-level generation unavailable: {e}")
    });

    RawExportPayload {
        model: chosen_model.clone(),
        generated_text: generation.text,
        per_token: generation.per_token,
        binary_probs,
        note,
    }
}

// =============================================================================
// REPORT ASSEMBLY
// =============================================================================

/// Headline numbers for one scoring run.
#[derive(Debug, Clone, Serialize)]
pub struct OverallBlock {
    pub final_confidence_pct: u32,
    pub best_answer: String,
    pub agreement_pct: u32,
    pub a_conf_pct: u32,
    pub b_conf_pct: u32,
}

/// Structured report combining one scoring run, its raw token payload,
/// and calibration statistics over past runs.
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceReport {
    pub prompt: String,
    pub chosen_model: ModelRef,
    pub overall: OverallBlock,
    pub per_token: Vec<TokenLogprob>,
    pub binary_probs: BinaryProbs,
    pub calibration: CalibrationSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Assemble the report for one scoring run.
pub fn assemble_report(
    prompt: impl Into<String>,
    scoring: &ScoringResult,
    raw: RawExportPayload,
    calibration: CalibrationSnapshot,
) -> ConfidenceReport {
    ConfidenceReport {
        prompt: prompt.into(),
        chosen_model: raw.model,
        overall: OverallBlock {
            final_confidence_pct: scoring.final_confidence_pct,
            best_answer: scoring.best_answer.clone(),
            agreement_pct: scoring.agreement_pct,
            a_conf_pct: scoring.a_conf_pct,
            b_conf_pct: scoring.b_conf_pct,
        },
        per_token: raw.per_token,
        binary_probs: raw.binary_probs,
        calibration,
        note: raw.note,
    }
}
