//! Provider and attachment types.

use base64::Engine;
use kbase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    Gemini,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }
}

/// Binary image sent alongside a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. "image/png"
    pub mime_type: String,

    /// Raw image bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read an image from disk, inferring its MIME type from the extension.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let mime_type = mime_from_extension(path).ok_or_else(|| {
            AppError::InvalidRequest(format!("Unsupported image type: {:?}", path))
        })?;
        let data = std::fs::read(path)?;
        Ok(Self::new(mime_type, data))
    }

    /// Standard base64 encoding of the image bytes, as providers expect.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
