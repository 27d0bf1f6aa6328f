//! Usage tracking via the UsageSink trait.
//!
//! The gateway logs all backend calls through a UsageSink. This decouples
//! the gateway from any specific storage backend:
//! - A service layer can persist records to its own call log
//! - CLI tools use NoopUsageSink or StderrUsageSink
//! - Tests use NoopUsageSink or a counting mock

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of one backend API call.
#[derive(Debug, Clone)]
pub struct BackendCallRecord {
    /// Backend name, e.g. "ollama".
    pub backend: &'static str,
    /// Endpoint: "api/generate", "api/embeddings", "v1/chat/completions".
    pub endpoint: &'static str,
    /// Model used.
    pub model: String,
    /// User who made the request (if known).
    pub user_id: Option<Uuid>,
    /// Scoring run this call belongs to (if any).
    pub run_id: Option<Uuid>,
    /// Latency in milliseconds.
    pub latency_ms: i64,
    /// Call status.
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// Which code path made this call.
    pub caller: &'static str,
    /// When the call was made.
    pub timestamp: DateTime<Utc>,
}

impl BackendCallRecord {
    /// Create a new record with required fields, defaulting others.
    pub fn new(
        backend: &'static str,
        endpoint: &'static str,
        model: impl Into<String>,
        caller: &'static str,
    ) -> Self {
        Self {
            backend,
            endpoint,
            model: model.into(),
            user_id: None,
            run_id: None,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            caller,
            timestamp: Utc::now(),
        }
    }

    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn run(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn latency(mut self, ms: i64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }
}

/// Trait for recording backend call usage.
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Record a backend call. This should be fire-and-forget:
    /// failures should be logged but not propagated.
    async fn record(&self, record: BackendCallRecord);
}

/// No-op usage sink that discards all records.
/// Useful for tests and embedded use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: BackendCallRecord) {
        // Discard
    }
}

/// Usage sink that writes to stderr as JSON lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrUsageSink;

#[async_trait]
impl UsageSink for StderrUsageSink {
    async fn record(&self, record: BackendCallRecord) {
        eprintln!(
            r#"{{"backend":"{}","endpoint":"{}","model":"{}","latency_ms":{},"status":"{}","caller":"{}"}}"#,
            record.backend,
            record.endpoint,
            record.model,
            record.latency_ms,
            record.status.as_str(),
            record.caller,
        );
    }
}
