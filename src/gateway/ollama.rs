//! Ollama adapter for answer generation, embeddings, and token-level output.
//!
//! Answer elicitation and embeddings go through Ollama's native API
//! (`/api/generate` with JSON-format output, `/api/embeddings`). The
//! token-level mode uses the OpenAI-compatible surface Ollama serves under
//! `/v1`, which is the only endpoint shape that carries log-probabilities.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GatewayError;
use super::types::*;
use super::usage::{BackendCallRecord, UsageSink};
use super::{EmbeddingGateway, ModelGateway, StructuredClassifier};
use crate::prompts;

// =============================================================================
// CONSTANTS
// =============================================================================

const BACKEND: &str = "ollama";

/// Maximum allowed response body (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Generation calls wait longest; embeddings are quick.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_TIMEOUT: Duration = Duration::from_secs(180);

/// Sampling temperature for answer elicitation.
const ANSWER_TEMPERATURE: f32 = 0.2;

// =============================================================================
// ADAPTER
// =============================================================================

/// Model used for classification calls unless overridden.
const DEFAULT_CLASSIFIER_MODEL: &str = "gemma2:2b";

/// HTTP adapter for an Ollama host.
#[derive(Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    classifier_model: ModelRef,
    usage_sink: Arc<dyn UsageSink>,
}

impl OllamaAdapter {
    /// Create an adapter for the given host, e.g. "http://localhost:11434".
    pub fn new(
        base_url: impl Into<String>,
        usage_sink: Arc<dyn UsageSink>,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            classifier_model: ModelRef::new(DEFAULT_CLASSIFIER_MODEL),
            usage_sink,
        })
    }

    /// Create from the OLLAMA_HOST environment variable,
    /// defaulting to the standard local port.
    pub fn from_env(usage_sink: Arc<dyn UsageSink>) -> Result<Self, GatewayError> {
        let host =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".into());
        Self::new(host, usage_sink)
    }

    /// Override the model used for classification calls.
    pub fn with_classifier_model(mut self, model: ModelRef) -> Self {
        self.classifier_model = model;
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// POST a JSON body and read the response with a size cap.
    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<(u16, String), GatewayError> {
        let mut response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(timeout)
                } else {
                    GatewayError::from(e)
                }
            })?;

        let status = response.status().as_u16();

        // Stream the body to enforce the size limit.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(GatewayError::backend(
                    BACKEND,
                    format!("Response too large: {new_len} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok((status, String::from_utf8_lossy(&bytes).to_string()))
    }

    async fn record(
        &self,
        endpoint: &'static str,
        model: &str,
        start: Instant,
        attribution: &Attribution,
        error_code: Option<&str>,
    ) {
        let mut record = BackendCallRecord::new(BACKEND, endpoint, model, attribution.caller)
            .user(attribution.user_id)
            .run(attribution.run_id)
            .latency(start.elapsed().as_millis() as i64);
        if let Some(code) = error_code {
            record = record.error(code);
        }
        self.usage_sink.record(record).await;
    }

    /// Run one generate call that must yield strict JSON output.
    async fn generate_json(
        &self,
        model: &ModelRef,
        prompt: String,
    ) -> Result<String, GatewayError> {
        let api_req = GenerateApiRequest {
            model: model.as_str(),
            prompt,
            format: "json",
            options: GenerateOptions {
                temperature: ANSWER_TEMPERATURE,
            },
            stream: false,
        };

        let (status, body) = self
            .post_json(&self.generate_url(), &api_req, GENERATE_TIMEOUT)
            .await?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<GenerateApiResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(GatewayError::backend_with_status(BACKEND, message, status));
        }

        let parsed: GenerateApiResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::invalid_payload(BACKEND, format!("Invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(GatewayError::backend(BACKEND, error));
        }

        Ok(parsed.response.unwrap_or_default().trim().to_string())
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct GenerateApiRequest<'a> {
    model: &'a str,
    prompt: String,
    format: &'static str,
    options: GenerateOptions,
    stream: bool,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    response: Option<String>,
    error: Option<String>,
}

/// The strict JSON object the answer prompt instructs the model to emit.
/// Absent keys fall back to explicit defaults; any other shape mismatch
/// is a hard failure.
#[derive(Deserialize)]
struct AnswerJson {
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    self_confidence: f64,
}

#[derive(Serialize)]
struct EmbedApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedApiResponse {
    embedding: Option<Vec<f64>>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    logprobs: bool,
    top_logprobs: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ChatApiError>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
    logprobs: Option<ChatLogprobs>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatLogprobs {
    content: Option<Vec<ChatTokenLogprob>>,
}

#[derive(Deserialize)]
struct ChatTokenLogprob {
    token: String,
    logprob: f64,
    #[serde(default)]
    top_logprobs: Vec<ChatTopLogprob>,
}

#[derive(Deserialize)]
struct ChatTopLogprob {
    token: String,
    logprob: f64,
}

#[derive(Deserialize)]
struct ChatApiError {
    message: Option<String>,
}

/// Coerce the "answer" field to a string the way a loosely typed consumer
/// would: strings pass through, null becomes empty, anything else is
/// rendered as JSON text.
fn answer_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// =============================================================================
// TRAIT IMPLS
// =============================================================================

#[async_trait]
impl ModelGateway for OllamaAdapter {
    async fn answer(
        &self,
        model: &ModelRef,
        prompt: &str,
        attribution: &Attribution,
    ) -> Result<ModelAnswer, GatewayError> {
        let start = Instant::now();
        let raw = match self
            .generate_json(model, prompts::answer_prompt(prompt))
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                self.record("api/generate", model.as_str(), start, attribution, Some(err.code()))
                    .await;
                return Err(err);
            }
        };

        // The model was instructed to emit {"answer", "self_confidence"}.
        // Malformed JSON is a hard failure, never silently defaulted.
        let parsed: Result<AnswerJson, _> = serde_json::from_str(&raw);
        let result = match parsed {
            Ok(json) => Ok(ModelAnswer::new(
                answer_text(json.answer),
                json.self_confidence,
            )),
            Err(e) => Err(GatewayError::invalid_payload(
                BACKEND,
                format!("Malformed answer JSON: {e}"),
            )),
        };

        let code = result.as_ref().err().map(|e| e.code());
        self.record("api/generate", model.as_str(), start, attribution, code)
            .await;
        result
    }

    async fn answer_with_tokens(
        &self,
        model: &ModelRef,
        prompt: &str,
        max_tokens: u32,
        top_k: u32,
        attribution: &Attribution,
    ) -> TokenGeneration {
        let start = Instant::now();
        let api_req = ChatApiRequest {
            model: model.as_str(),
            messages: vec![ChatApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: ANSWER_TEMPERATURE,
            max_tokens,
            logprobs: true,
            top_logprobs: top_k,
            stream: false,
        };

        let result = self
            .post_json(&self.chat_completions_url(), &api_req, TOKEN_TIMEOUT)
            .await;

        let generation = match result {
            Err(err) => TokenGeneration::failed(err.to_string()),
            Ok((status, body)) if !(200..300).contains(&status) => {
                let message = serde_json::from_str::<ChatApiResponse>(&body)
                    .ok()
                    .and_then(|r| r.error)
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("HTTP {status}"));
                TokenGeneration::failed(message)
            }
            Ok((_, body)) => match serde_json::from_str::<ChatApiResponse>(&body) {
                Err(e) => TokenGeneration::failed(format!("Invalid JSON: {e}")),
                Ok(parsed) => token_generation_from_response(parsed),
            },
        };

        let code = generation.error.as_ref().map(|_| "token_generation_failed");
        self.record("v1/chat/completions", model.as_str(), start, attribution, code)
            .await;
        generation
    }
}

fn token_generation_from_response(parsed: ChatApiResponse) -> TokenGeneration {
    if let Some(error) = parsed.error {
        return TokenGeneration::failed(error.message.unwrap_or_default());
    }

    let Some(choice) = parsed.choices.and_then(|c| c.into_iter().next()) else {
        return TokenGeneration::failed("No choices in response");
    };

    let text = choice
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();

    let per_token = choice
        .logprobs
        .and_then(|lp| lp.content)
        .unwrap_or_default()
        .into_iter()
        .map(|t| TokenLogprob {
            prob: t.logprob.exp(),
            topk: t
                .top_logprobs
                .into_iter()
                .map(|alt| TokenAlternative {
                    prob: alt.logprob.exp(),
                    token: alt.token,
                    logprob: alt.logprob,
                })
                .collect(),
            token: t.token,
            logprob: t.logprob,
        })
        .collect();

    TokenGeneration {
        text,
        per_token,
        error: None,
    }
}

#[async_trait]
impl EmbeddingGateway for OllamaAdapter {
    async fn embed(
        &self,
        text: &str,
        model: &EmbedModelRef,
        attribution: &Attribution,
    ) -> Result<Vec<f64>, GatewayError> {
        let start = Instant::now();
        let api_req = EmbedApiRequest {
            model: model.as_str(),
            prompt: text,
        };

        let result = async {
            let (status, body) = self
                .post_json(&self.embeddings_url(), &api_req, EMBED_TIMEOUT)
                .await?;

            if !(200..300).contains(&status) {
                let message = serde_json::from_str::<EmbedApiResponse>(&body)
                    .ok()
                    .and_then(|r| r.error)
                    .unwrap_or_else(|| format!("HTTP {status}"));
                return Err(GatewayError::backend_with_status(BACKEND, message, status));
            }

            let parsed: EmbedApiResponse = serde_json::from_str(&body).map_err(|e| {
                GatewayError::invalid_payload(BACKEND, format!("Invalid JSON: {e}"))
            })?;

            parsed.embedding.ok_or_else(|| {
                GatewayError::invalid_payload(BACKEND, "No embedding in response")
            })
        }
        .await;

        let code = result.as_ref().err().map(|e| e.code());
        self.record("api/embeddings", model.as_str(), start, attribution, code)
            .await;
        result
    }
}

#[async_trait]
impl StructuredClassifier for OllamaAdapter {
    async fn classify(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        attribution: &Attribution,
    ) -> Result<String, GatewayError> {
        let start = Instant::now();
        let model = self.classifier_model.clone();
        let prompt = format!("{system_prompt}\n\nUser: {user_prompt}\nAssistant:");
        let result = self.generate_json(&model, prompt).await;

        let code = result.as_ref().err().map(|e| e.code());
        self.record("api/generate", model.as_str(), start, attribution, code)
            .await;
        result
    }
}
