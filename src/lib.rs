#![forbid(unsafe_code)]

//! # concord-harness
//!
//! Estimates how trustworthy a generated answer is by asking two
//! independent model backends the same question, measuring how much their
//! answers semantically agree, and blending that agreement with each
//! model's self-reported confidence into a single calibrated score plus
//! the chosen answer.
//!
//! Secondary capabilities cross-check the chosen answer against retrieved
//! reference snippets at sentence granularity ([`alignment`]), filter and
//! deduplicate those references first ([`relevance`]), and assemble a
//! structured report from one scoring run plus historical runs
//! ([`calibration`], [`report`]).
//!
//! Network backends sit behind the trait seams in [`gateway`]; the
//! provided [`gateway::OllamaAdapter`] implements all of them against one
//! Ollama host. The service layer owning HTTP, auth and persistence
//! invokes this crate as a library.

pub mod alignment;
pub mod calibration;
pub mod gateway;
pub mod prompts;
pub mod relevance;
pub mod report;
pub mod scoring;
pub mod sentences;

pub use alignment::{analyze, form_search_query, AlignmentStatus, SentenceAlignment};
pub use calibration::{
    snapshot, BucketCounts, CalibrationSnapshot, ConfidenceHistory, DEFAULT_HISTORY_LIMIT,
};
pub use gateway::{
    Attribution, EmbedModelRef, EmbeddingGateway, GatewayError, ModelAnswer, ModelGateway,
    ModelRef, OllamaAdapter, StructuredClassifier, TokenGeneration, TokenLogprob,
};
pub use relevance::{filter_results, FilterOptions, ReferenceResult};
pub use report::{
    assemble_report, build_raw_payload, BinaryProbs, ConfidenceReport, RawExportPayload,
    RawPayloadOptions,
};
pub use scoring::{
    cosine, percent_of, score, ScoreError, ScoringRequest, ScoringResult,
    DEFAULT_WEIGHT_AGREEMENT,
};
pub use sentences::split_sentences;
