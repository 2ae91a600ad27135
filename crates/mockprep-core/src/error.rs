use mockprep_provider::ProviderError;
use mockprep_schema::AnalysisStatus;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by media and session stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid media reference: {0}")]
    InvalidReference(String),
    #[error("invalid status transition for response {response_id}: {from} -> {to}")]
    InvalidTransition {
        response_id: Uuid,
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid stored document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Why a model reply could not be turned into a structured result.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("model reply was empty")]
    EmptyReply,
    #[error("model reply is not valid json: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("model reply is not a json object")]
    NotAnObject,
    #[error("field `{field}` is not a number: {value}")]
    InvalidNumber { field: String, value: String },
}

/// A failure inside one response's pipeline. Recorded as `failed` on that
/// response; never aborts the session.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("response has no media")]
    MissingMedia,
    #[error("media unavailable: {0}")]
    Media(#[source] StoreError),
    #[error("failed to persist response: {0}")]
    Persist(#[source] StoreError),
    #[error("failed to encode feedback: {0}")]
    Encode(#[from] serde_json::Error),
}
