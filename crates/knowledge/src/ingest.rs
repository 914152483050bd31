//! Document ingestion: text extraction, normalization and persistence.

use crate::rank::is_candidate;
use crate::retrieval::Retriever;
use crate::store::DocumentStore;
use crate::types::{
    Document, NewDocument, DEFAULT_TITLE, MAX_CONTENT_CHARS, MAX_TITLE_CHARS, TRUNCATION_MARKER,
};
use kbase_core::{AppError, AppResult};
use std::sync::Arc;

/// Uploads larger than this are rejected.
pub const MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

/// MIME types accepted for uploaded files.
pub const ALLOWED_MIME_TYPES: [&str; 2] = ["application/pdf", "text/plain"];

const SAFE_TITLE_CHARS: usize = 60;

/// A file handed over by the upload surface.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Reference assigned by external file storage, if it already has one
    pub file_ref: Option<String>,
}

/// Everything needed to create one document.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub owner_id: String,
    pub title: Option<String>,
    /// Free text appended after any extracted file text
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
}

/// Turns raw file bytes into text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> AppResult<String>;
}

/// UTF-8 text; invalid sequences are replaced.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> AppResult<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// PDF text via `pdf-extract`.
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> AppResult<String> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| AppError::Extraction(e.to_string()))
    }
}

/// Extractor for an accepted MIME type.
pub fn extractor_for(mime_type: &str) -> Option<Box<dyn TextExtractor>> {
    match mime_type {
        "application/pdf" => Some(Box::new(PdfExtractor)),
        "text/plain" => Some(Box::new(PlainTextExtractor)),
        _ => None,
    }
}

/// Trimmed title, defaulted when blank, cut to the title limit.
pub fn normalize_title(title: Option<&str>) -> String {
    let trimmed = title.map(str::trim).unwrap_or_default();
    let title = if trimmed.is_empty() {
        DEFAULT_TITLE
    } else {
        trimmed
    };
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// Cap content at the size limit; returns the stored text and whether it
/// was cut.
pub fn truncate_content(content: String) -> (String, bool) {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((idx, _)) => {
            let mut kept = content[..idx].to_string();
            kept.push_str(TRUNCATION_MARKER);
            (kept, true)
        }
        None => (content, false),
    }
}

/// Storage key for an uploaded file: `knowledge/<owner>/<millis>_<safe-title>`.
pub fn file_ref_for(owner_id: &str, title: &str, unix_millis: i64) -> String {
    let source = if title.is_empty() { "doc" } else { title };
    let safe: String = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(SAFE_TITLE_CHARS)
        .collect();
    format!("knowledge/{}/{}_{}", owner_id, unix_millis, safe)
}

/// Creates, lists and deletes knowledge documents.
pub struct Ingestor {
    documents: Arc<dyn DocumentStore>,
    retriever: Arc<Retriever>,
}

impl Ingestor {
    pub fn new(documents: Arc<dyn DocumentStore>, retriever: Arc<Retriever>) -> Self {
        Self {
            documents,
            retriever,
        }
    }

    /// Build and persist a document, then cache its embedding.
    ///
    /// # Errors
    /// * `InvalidDocument` - unsupported file, oversized upload, or neither
    ///   text nor file supplied
    /// * `Extraction` - the file could not be read as text
    /// * `Persistence` - the store rejected the write
    pub async fn ingest(&self, request: IngestRequest) -> AppResult<Document> {
        let title = normalize_title(request.title.as_deref());
        let mut content = String::new();
        let mut file_ref = None;
        let mut file_kind = None;

        if let Some(file) = request.file {
            let extractor = extractor_for(&file.mime_type).ok_or_else(|| {
                AppError::InvalidDocument("Only PDF and TXT files are allowed".to_string())
            })?;

            if file.bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::InvalidDocument(format!(
                    "File exceeds the {} MiB limit",
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                )));
            }

            file_ref = Some(file.file_ref.unwrap_or_else(|| {
                file_ref_for(&request.owner_id, &title, chrono::Utc::now().timestamp_millis())
            }));

            let bytes = file.bytes;
            content = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
                .await
                .map_err(|e| AppError::Extraction(format!("Extraction task failed: {}", e)))??
                .trim()
                .to_string();

            tracing::debug!(mime = %file.mime_type, chars = content.chars().count(), "Extracted file text");
            file_kind = Some(file.mime_type);
        }

        if let Some(extra) = request.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if content.is_empty() {
                content = extra.to_string();
            } else {
                content = format!("{}\n\n{}", content, extra);
            }
        }

        let (content, content_truncated) = truncate_content(content);
        if content_truncated {
            tracing::warn!(title = %title, "Document content truncated at {} characters", MAX_CONTENT_CHARS);
        }

        let mut document = self
            .documents
            .insert(NewDocument {
                title,
                content,
                content_truncated,
                file_ref,
                file_kind,
                owner_id: request.owner_id,
            })
            .await?;

        tracing::info!(doc_id = %document.id, title = %document.title, "Ingested document");

        if is_candidate(&document, self.retriever.settings()) {
            match self.retriever.embed_document(&document).await {
                Ok(vector) => {
                    document.embedding = Some(vector);
                    document.embedding_model = Some(self.retriever.embedding_model().to_string());
                }
                Err(e) => tracing::warn!(
                    doc_id = %document.id,
                    "Embedding deferred to first question: {}",
                    e
                ),
            }
        }

        Ok(document)
    }

    /// Documents uploaded by `owner_id`, newest first.
    pub async fn list(&self, owner_id: &str, light: bool) -> AppResult<Vec<Document>> {
        self.documents.list_by_owner(owner_id, light).await
    }

    /// Delete one of `owner_id`'s documents; `None` if it does not exist or
    /// belongs to someone else.
    pub async fn delete(&self, id: &str, owner_id: &str) -> AppResult<Option<Document>> {
        self.documents.delete(id, owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title(None), DEFAULT_TITLE);
        assert_eq!(normalize_title(Some("   ")), DEFAULT_TITLE);
        assert_eq!(normalize_title(Some("  Refund Policy ")), "Refund Policy");
        assert_eq!(
            normalize_title(Some("ü".repeat(300).as_str())).chars().count(),
            MAX_TITLE_CHARS
        );
    }

    #[test]
    fn test_truncate_content_at_limit() {
        let (kept, truncated) = truncate_content("a".repeat(MAX_CONTENT_CHARS));
        assert!(!truncated);
        assert_eq!(kept.len(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_truncate_content_over_limit() {
        let (kept, truncated) = truncate_content("a".repeat(MAX_CONTENT_CHARS + 1));
        assert!(truncated);
        assert_eq!(
            kept.chars().count(),
            MAX_CONTENT_CHARS + TRUNCATION_MARKER.chars().count()
        );
        assert!(kept.ends_with(TRUNCATION_MARKER));
        assert_eq!(&kept[..MAX_CONTENT_CHARS], "a".repeat(MAX_CONTENT_CHARS));
    }

    #[test]
    fn test_file_ref_for() {
        assert_eq!(
            file_ref_for("admin-1", "Refund Policy (2024)", 1_700_000_000_000),
            "knowledge/admin-1/1700000000000_Refund_Policy__2024_"
        );

        let long = file_ref_for("a", &"x".repeat(100), 1);
        assert_eq!(long, format!("knowledge/a/1_{}", "x".repeat(60)));
    }

    #[test]
    fn test_extractor_for() {
        assert!(extractor_for("application/pdf").is_some());
        assert!(extractor_for("text/plain").is_some());
        assert!(extractor_for("image/png").is_none());
    }

    #[test]
    fn test_plain_text_is_lossy() {
        let text = PlainTextExtractor.extract(&[b'o', b'k', 0xff]).unwrap();
        assert!(text.starts_with("ok"));
    }
}
