//! Prompt loader for YAML prompt definitions.

use crate::builtin::{builtin_prompt, GROUNDED_ANSWER_PROMPT_ID};
use crate::types::PromptDefinition;
use kbase_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Directory, relative to the workspace, that holds prompt overrides.
const PROMPTS_DIR: &str = ".kbase/prompts";

/// Load a prompt definition by ID from the workspace.
///
/// This function reads `<id>.yml` from the `.kbase/prompts/` directory.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.kbase/`
/// * `prompt_id` - Prompt identifier (e.g., "grounded-answer")
///
/// # Example
/// ```no_run
/// use kbase_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "grounded-answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;
    if prompt_id == GROUNDED_ANSWER_PROMPT_ID || definition.id == GROUNDED_ANSWER_PROMPT_ID {
        validate_grounding(&definition)?;
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a workspace override if present, otherwise the built-in definition.
pub fn load_prompt_or_builtin(
    workspace_path: &Path,
    prompt_id: &str,
) -> AppResult<PromptDefinition> {
    if prompt_path(workspace_path, prompt_id).exists() {
        return load_prompt(workspace_path, prompt_id);
    }

    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    workspace_path
        .join(PROMPTS_DIR)
        .join(format!("{}.yml", prompt_id))
}

/// Placeholders the grounding instruction cannot drop: the context it is
/// restricted to and the exact refusal sentence.
const GROUNDING_VARIABLES: [&str; 2] = ["{{context}}", "{{refusal}}"];

fn validate_grounding(def: &PromptDefinition) -> AppResult<()> {
    match GROUNDING_VARIABLES
        .iter()
        .find(|variable| !def.system.contains(*variable))
    {
        Some(missing) => Err(AppError::Prompt(format!(
            "Prompt '{}' must reference {} in its system template",
            def.id, missing
        ))),
        None => Ok(()),
    }
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.system.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt system template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) -> PathBuf {
        let prompts_dir = dir.join(PROMPTS_DIR);
        fs::create_dir_all(&prompts_dir).unwrap();

        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn valid_prompt(id: &str) -> String {
        format!(
            r#"
id: {}
title: "Terse answers"
apiVersion: "1.0"
system: "Answer in one sentence from: {{{{context}}}} Otherwise say: {{{{refusal}}}}"
"#,
            id
        )
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "terse", &valid_prompt("terse"));

        let prompt = load_prompt(temp_dir.path(), "terse").unwrap();
        assert_eq!(prompt.id, "terse");
        assert_eq!(
            prompt.system,
            "Answer in one sentence from: {{context}} Otherwise say: {{refusal}}"
        );
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_load_rejects_bad_api_version() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "old",
            "id: old\ntitle: Old\napiVersion: \"1\"\nsystem: \"{{context}}\"\n",
        );
        assert!(load_prompt(temp_dir.path(), "old").is_err());
    }

    #[test]
    fn test_builtin_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt_or_builtin(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.created_by, "kbase");
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            GROUNDED_ANSWER_PROMPT_ID,
            &valid_prompt(GROUNDED_ANSWER_PROMPT_ID),
        );

        let prompt = load_prompt_or_builtin(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.title, "Terse answers");
    }

    #[test]
    fn test_grounding_override_must_keep_context_and_refusal() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            GROUNDED_ANSWER_PROMPT_ID,
            "id: grounded-answer\ntitle: Loose\napiVersion: \"1.0\"\nsystem: \"You are a friendly assistant. Use general knowledge freely.\"\n",
        );
        let err = load_prompt_or_builtin(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap_err();
        assert!(err.to_string().contains("{{context}}"));

        write_prompt(
            temp_dir.path(),
            GROUNDED_ANSWER_PROMPT_ID,
            "id: renamed\ntitle: No refusal\napiVersion: \"1.0\"\nsystem: \"Answer from: {{context}}\"\n",
        );
        let err = load_prompt_or_builtin(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap_err();
        assert!(err.to_string().contains("{{refusal}}"));
    }

    #[test]
    fn test_other_prompts_need_no_grounding_variables() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "summary",
            "id: summary\ntitle: Summary\napiVersion: \"1.0\"\nsystem: \"Summarize briefly.\"\n",
        );
        assert!(load_prompt(temp_dir.path(), "summary").is_ok());
    }

    #[test]
    fn test_unknown_prompt_without_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt_or_builtin(temp_dir.path(), "nope").is_err());
    }
}
