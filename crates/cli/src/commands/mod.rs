//! Command handlers for the Kbase CLI.

pub mod ask;
pub mod history;
pub mod knowledge;

pub use ask::AskCommand;
pub use history::HistoryCommand;
pub use knowledge::KnowledgeCommand;

use kbase_core::{AppError, AppResult};

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
