//! Knowledge base type definitions.

use chrono::{DateTime, Utc};
use kbase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Title used when the uploader leaves it blank.
pub const DEFAULT_TITLE: &str = "Untitled Document";

/// Titles are cut to this many characters.
pub const MAX_TITLE_CHARS: usize = 250;

/// Stored content is capped at this many characters.
pub const MAX_CONTENT_CHARS: usize = 1_000_000;

/// Appended to content that hit [`MAX_CONTENT_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to size limit]";

/// A stored knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Extracted text body; empty when only a file reference exists
    /// or when listed in light mode
    pub content: String,

    /// Whether `content` was cut at the size limit
    pub content_truncated: bool,

    /// Cached embedding of the leading slice of `content`
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// Model that produced `embedding`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Pointer to the externally stored original file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,

    /// MIME type of the original file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_kind: Option<String>,

    /// Principal that uploaded the document
    pub owner_id: String,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Cached embedding, if it was produced by `model`.
    pub fn cached_embedding(&self, model: &str) -> Option<&[f32]> {
        match (&self.embedding, &self.embedding_model) {
            (Some(vector), Some(m)) if m == model => Some(vector.as_slice()),
            _ => None,
        }
    }
}

/// A document that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub content_truncated: bool,
    pub file_ref: Option<String>,
    pub file_kind: Option<String>,
    pub owner_id: String,
}

impl NewDocument {
    /// Reject documents that must never be persisted.
    pub fn validate(&self) -> AppResult<()> {
        let has_file = self
            .file_ref
            .as_deref()
            .map(|f| !f.trim().is_empty())
            .unwrap_or(false);

        if self.content.is_empty() && !has_file {
            return Err(AppError::InvalidDocument(
                "Provide either a file or text content".to_string(),
            ));
        }

        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::InvalidDocument(format!(
                "Title cannot exceed {} characters",
                MAX_TITLE_CHARS
            )));
        }

        if self.content.chars().count() > MAX_CONTENT_CHARS + TRUNCATION_MARKER.chars().count() {
            return Err(AppError::InvalidDocument(format!(
                "Content exceeds {} characters",
                MAX_CONTENT_CHARS
            )));
        }

        if self.owner_id.trim().is_empty() {
            return Err(AppError::InvalidDocument("Owner is required".to_string()));
        }

        Ok(())
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "bot" => Some(Role::Bot),
            _ => None,
        }
    }
}

/// One immutable conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub owner_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A document paired with its similarity to the current question.
#[derive(Debug, Clone)]
pub struct Match {
    pub document: Document,
    pub similarity: f32,
}
