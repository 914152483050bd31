//! Knowledge base and grounded answering.
//!
//! Documents are ingested into a SQLite store with their embedding cached
//! at ingestion time. A question is embedded, ranked against every stored
//! document, the best matches are assembled into one context block, and
//! the answer is generated under a grounding instruction and a post-hoc
//! guard.
//!
//! [`Services::open`] wires everything from an [`AppConfig`](kbase_core::AppConfig).

pub mod bootstrap;
pub mod chat;
pub mod context;
pub mod embeddings;
pub mod guard;
pub mod ingest;
pub mod rank;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use bootstrap::{ServiceParts, Services};
pub use chat::{ChatExchange, ChatOutcome, ChatPipeline, IMAGE_PLACEHOLDER};
pub use context::{assemble, CONTEXT_SEPARATOR};
pub use embeddings::{Embedder, EmbeddingConfig, EmbeddingProvider};
pub use guard::{
    apply_post_hoc_guard, AnswerKind, GroundedAnswerGuard, GuardedAnswer, EMPTY_REPLY_FALLBACK,
    IMAGE_ONLY_MESSAGE, REFUSAL,
};
pub use ingest::{IngestRequest, Ingestor, UploadedFile, ALLOWED_MIME_TYPES};
pub use rank::{cosine_similarity, rank};
pub use retrieval::Retriever;
pub use store::{DocumentStore, MessageStore, SqliteStore};
pub use types::{Document, Match, Message, NewDocument, Role};
