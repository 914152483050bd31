//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use kbase_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system and the user templates are rendered with Handlebars.
/// Values are inserted verbatim: HTML escaping is disabled and values are
/// never re-parsed as templates.
///
/// # Example
/// ```no_run
/// use kbase_prompt::{build_prompt, grounded_answer_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is the refund policy?".to_string());
/// vars.insert("context".to_string(), "Refunds are issued within 30 days.".to_string());
///
/// let built = build_prompt(&grounded_answer_prompt(), vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = render_template(&definition.system, &variables)?;
    let user = render_template(&definition.user, &variables)?;

    Ok(BuiltPrompt::new(
        Some(system),
        user,
        definition.id.clone(),
        variables.into_keys().collect(),
    ))
}

/// Build the grounding prompt for one question.
///
/// The assembled `context` lands verbatim in the system instruction; the
/// question becomes the user turn.
pub fn build_grounded_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: &str,
    refusal: &str,
) -> AppResult<BuiltPrompt> {
    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("context".to_string(), context.to_string());
    variables.insert("refusal".to_string(), refusal.to_string());

    build_prompt(definition, variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::grounded_answer_prompt;

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{question}}", &vars);
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), "Use <b>bold</b> & \"quotes\"".to_string());

        let result = render_template("{{context}}", &vars).unwrap();
        assert_eq!(result, "Use <b>bold</b> & \"quotes\"");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let vars = HashMap::new();
        // Handlebars renders missing variables as empty string
        assert_eq!(render_template("Question: {{missing}}", &vars).unwrap(), "Question: ");
    }

    #[test]
    fn test_grounded_prompt_embeds_context_verbatim() {
        let context = "Refunds are issued within 30 days.\n\n{{not a template}}";
        let built = build_grounded_prompt(
            &grounded_answer_prompt(),
            "What is the refund policy?",
            context,
            "I don't have information about that.",
        )
        .unwrap();

        let system = built.system.unwrap();
        assert!(system.contains(context));
        assert!(system.contains("\"I don't have information about that.\""));
        assert!(system.contains("ONLY") || system.contains("**only**"));
        assert_eq!(built.user, "What is the refund policy?");
        assert_eq!(
            built.metadata.resolved_variables,
            vec!["context", "question", "refusal"]
        );
    }

    #[test]
    fn test_invalid_template_is_an_error() {
        let mut def = grounded_answer_prompt();
        def.system = "{{#if}}".to_string();
        let result = build_grounded_prompt(&def, "q", "c", "r");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }
}
