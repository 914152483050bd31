//! Prompt definitions compiled into the binary.

use crate::types::PromptDefinition;

/// Identifier of the grounding instruction used for every answer.
pub const GROUNDED_ANSWER_PROMPT_ID: &str = "grounded-answer";

const GROUNDED_ANSWER_SYSTEM: &str = r#"You are a helpful assistant that answers questions **only** using the provided knowledge base content.
You must NEVER use general knowledge, internet information, assumptions or common sense that is not explicitly written in the provided context.
If the answer is not clearly supported by the context, or if the question is unrelated, reply **only** with this exact sentence:

"{{refusal}}"

Knowledge base content:
{{context}}

Now answer the following question based **only** on the text above:"#;

/// The default grounding instruction.
///
/// Template variables: `context` (assembled knowledge, inserted verbatim),
/// `refusal` (the exact refusal sentence) and `question`.
pub fn grounded_answer_prompt() -> PromptDefinition {
    PromptDefinition {
        id: GROUNDED_ANSWER_PROMPT_ID.to_string(),
        title: "Answer strictly from knowledge base content".to_string(),
        api_version: "1.0".to_string(),
        created_by: "kbase".to_string(),
        system: GROUNDED_ANSWER_SYSTEM.to_string(),
        user: "{{question}}".to_string(),
    }
}

/// Look up a built-in definition by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        GROUNDED_ANSWER_PROMPT_ID => Some(grounded_answer_prompt()),
        _ => None,
    }
}
