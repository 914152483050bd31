//! Error types for the knowledge-base assistant.
//!
//! This module defines a unified error enum that covers every error
//! category in the application: configuration, I/O, the generation and
//! embedding capabilities, persistence, ingestion and prompt rendering.

use thiserror::Error;

/// Generic reply shown to an end user when answering fails.
pub const CHAT_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while generating an answer. Please try again.";

/// Shown when a conversation log cannot be read back.
pub const HISTORY_FAILURE_MESSAGE: &str = "Cannot load history";

/// Unified error type for the knowledge-base assistant.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text-generation provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors not covered by a more specific variant
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Malformed caller input (e.g. neither text nor image supplied)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A document that must not be persisted
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Text could not be extracted from an uploaded file
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The embedding capability is missing or failed to load
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// An embedding call exceeded its deadline
    #[error("Embedding timed out after {0}s")]
    EmbeddingTimeout(u64),

    /// A generation call exceeded its deadline
    #[error("Generation timed out after {0}s")]
    GenerationTimeout(u64),

    /// Document or message storage failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure is transient (a deadline was hit).
    ///
    /// Transient failures are surfaced to the user but never retried
    /// automatically.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingTimeout(_) | AppError::GenerationTimeout(_)
        )
    }

    /// Safe, user-facing text for the chat path.
    ///
    /// Internal detail is never echoed; every pipeline failure collapses to
    /// one generic message.
    pub fn user_message(&self) -> &'static str {
        CHAT_FAILURE_MESSAGE
    }

    /// Safe, user-facing text for the ingestion path.
    ///
    /// Only category information leaks: a parsing issue, a validation
    /// message we wrote ourselves, or a generic failure.
    pub fn ingest_message(&self) -> String {
        match self {
            AppError::Extraction(_) => "PDF parsing issue".to_string(),
            AppError::InvalidDocument(msg) | AppError::InvalidRequest(msg) => msg.clone(),
            _ => "Upload failed".to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
