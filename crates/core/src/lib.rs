//! Kbase Core Library
//!
//! This crate provides the foundational utilities for the knowledge-base
//! assistant:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, EmbeddingSettings, GenerationSettings, RetrievalSettings};
pub use error::{AppError, AppResult, CHAT_FAILURE_MESSAGE, HISTORY_FAILURE_MESSAGE};
