//! Context assembly for grounded answers.

use crate::types::Match;

/// Visual separator placed between documents in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n────────────────────────────\n\n";

/// Join the full, trimmed content of each match in ranking order.
///
/// Callers handle the empty case before getting here; an empty slice yields
/// an empty string.
pub fn assemble(matches: &[Match]) -> String {
    matches
        .iter()
        .map(|m| m.document.content.trim())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
