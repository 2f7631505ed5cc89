//! Domain and collaborator error types.
//!
//! `DomainError` models the error kinds from the system's error-handling
//! design: `Transient`, `Timeout`, `NotFound`, `Conflict`, `Validation`,
//! `Upstream`, `Fatal`. Collaborator-specific enums (`BusError`,
//! `CacheError`, `StoreError`, `LlmError`, `EmbedderError`) are raised by
//! the trait methods in `chatmesh-core` and convert into `DomainError` at
//! the boundary where a decision (retry, degrade, surface) is made.

use thiserror::Error;

/// Top-level error kind, shared by every component.
///
/// - `Transient`: network blip or broker redelivery hint -- retry with backoff.
/// - `Timeout`: collaborator too slow -- degrade where documented, else surface.
/// - `NotFound`: missing session/user -- 404 on HTTP, drop-with-warning in workers.
/// - `Conflict`: idempotent no-op.
/// - `Validation`: bad request -- 400.
/// - `Upstream`: LLM or store failure -- 502 on HTTP, dead-letter after retries.
/// - `Fatal`: misconfiguration -- crash fast, let the orchestrator restart.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("transient error: {0}")]
    Transient(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("fatal misconfiguration: {0}")]
    Fatal(String),
}

impl DomainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Transient(_) | DomainError::Timeout(_))
    }
}

/// Errors raised by a `MessageBus` implementation.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no receiver registered for session '{0}'")]
    SessionNotBound(String),

    #[error("publish timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("topic '{0}' is at capacity")]
    ChannelFull(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

impl From<BusError> for DomainError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Timeout(d) => DomainError::Timeout(d),
            BusError::SessionNotBound(s) => DomainError::NotFound(s),
            other => DomainError::Transient(other.to_string()),
        }
    }
}

/// Errors raised by the `HotCache` implementation.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CacheError> for DomainError {
    fn from(err: CacheError) -> Self {
        DomainError::Transient(err.to_string())
    }
}

/// Errors raised by document/vector store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => DomainError::NotFound("document not found".into()),
            StoreError::Conflict(m) => DomainError::Conflict(m),
            other => DomainError::Upstream(other.to_string()),
        }
    }
}

/// Errors raised by an `LlmProvider` implementation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("context length exceeded: max {max}, requested {requested}")]
    ContextLengthExceeded { max: u32, requested: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<LlmError> for DomainError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited { .. } | LlmError::Overloaded(_) => DomainError::Transient(err.to_string()),
            LlmError::InvalidRequest(m) => DomainError::Validation(m),
            LlmError::AuthenticationFailed => DomainError::Fatal(err.to_string()),
            other => DomainError::Upstream(other.to_string()),
        }
    }
}

/// Errors raised by an `Embedder` implementation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    Provider(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<EmbedderError> for DomainError {
    fn from(err: EmbedderError) -> Self {
        DomainError::Upstream(err.to_string())
    }
}
