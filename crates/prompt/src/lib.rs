//! Prompt system for the knowledge-base assistant.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions with built-in defaults
//! - Handlebars template rendering
//! - The grounding instruction used for every answer

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_grounded_prompt, build_prompt};
pub use builtin::{grounded_answer_prompt, GROUNDED_ANSWER_PROMPT_ID};
pub use loader::{load_prompt, load_prompt_or_builtin};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
