//! Grounded answer generation.
//!
//! [`GroundedAnswerGuard`] wraps the text-generation call: it renders the
//! grounding instruction around the assembled context, invokes the model
//! with fixed sampling parameters under a deadline, and finally runs the
//! post-hoc heuristic that replaces ungrounded-looking replies with the
//! refusal sentence.

use kbase_core::{AppError, AppResult, GenerationSettings};
use kbase_llm::{ImageAttachment, LlmClient, LlmRequest};
use kbase_prompt::{build_grounded_prompt, PromptDefinition};
use std::sync::Arc;
use std::time::Duration;

/// The single sentence returned whenever no grounded answer can be given.
pub const REFUSAL: &str = "I don't have information about that.";

/// Replies containing this phrase are treated as refusals by the guard.
pub const REFUSAL_MARKER: &str = "don't have";

/// Returned when only an image was sent.
pub const IMAGE_ONLY_MESSAGE: &str = "I currently only answer text questions based on admin-uploaded knowledge. Please send a text question along with the image.";

/// Returned when the model produced no text.
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I couldn't generate a response.";

/// Replies at most this long are never overridden.
const OVERRIDE_MIN_REPLY_CHARS: usize = 80;

/// Length of the question prefix looked up in the context.
const QUESTION_PREFIX_CHARS: usize = 30;

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Image without question text; generation skipped
    ImageOnly,
    /// Empty context; generation skipped
    NoGrounding,
    /// The model's reply passed through the guard
    Generated,
    /// The guard replaced the model's reply with [`REFUSAL`]
    Overridden,
}

/// Final text plus how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedAnswer {
    pub text: String,
    pub kind: AnswerKind,
}

/// Whether the post-hoc heuristic should replace `reply` with the refusal.
///
/// All three must hold: the reply does not contain "don't have", it is
/// longer than 80 characters, and the context does not contain the first
/// 30 characters of the question. Comparison is case-insensitive plain
/// substring containment.
pub fn should_override(reply: &str, question: &str, context: &str) -> bool {
    let question_prefix: String = question
        .to_lowercase()
        .chars()
        .take(QUESTION_PREFIX_CHARS)
        .collect();

    !reply.to_lowercase().contains(REFUSAL_MARKER)
        && reply.chars().count() > OVERRIDE_MIN_REPLY_CHARS
        && !context.to_lowercase().contains(&question_prefix)
}

/// Apply the post-hoc heuristic. Never fails.
pub fn apply_post_hoc_guard(reply: String, question: &str, context: &str) -> GuardedAnswer {
    if should_override(&reply, question, context) {
        GuardedAnswer {
            text: REFUSAL.to_string(),
            kind: AnswerKind::Overridden,
        }
    } else {
        GuardedAnswer {
            text: reply,
            kind: AnswerKind::Generated,
        }
    }
}

/// Generation capability constrained to a context block.
pub struct GroundedAnswerGuard {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    settings: GenerationSettings,
}

impl GroundedAnswerGuard {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            settings,
        }
    }

    /// Answer `question` strictly from `context`.
    ///
    /// # Errors
    /// * `GenerationTimeout` - the model did not answer within the deadline
    /// * `Llm` / `Prompt` - generation or prompt rendering failed
    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        image: Option<&ImageAttachment>,
    ) -> AppResult<GuardedAnswer> {
        let question = question.trim();

        if question.is_empty() && image.is_some() {
            return Ok(GuardedAnswer {
                text: IMAGE_ONLY_MESSAGE.to_string(),
                kind: AnswerKind::ImageOnly,
            });
        }

        if context.trim().is_empty() {
            return Ok(GuardedAnswer {
                text: REFUSAL.to_string(),
                kind: AnswerKind::NoGrounding,
            });
        }

        let built = build_grounded_prompt(&self.prompt, question, context, REFUSAL)?;

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens)
            .with_top_p(self.settings.top_p);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(image) = image {
            request = request.with_image(image.clone());
        }

        tracing::info!(
            provider = self.client.provider_name(),
            model = %self.model,
            context_chars = context.chars().count(),
            "Generating grounded answer"
        );

        let secs = self.settings.timeout_secs;
        let response = tokio::time::timeout(Duration::from_secs(secs), self.client.complete(&request))
            .await
            .map_err(|_| AppError::GenerationTimeout(secs))??;

        let reply = match response.content.trim() {
            "" => EMPTY_REPLY_FALLBACK.to_string(),
            text => text.to_string(),
        };

        let guarded = apply_post_hoc_guard(reply, question, context);
        if guarded.kind == AnswerKind::Overridden {
            tracing::info!("Reply overridden by grounding guard");
        }

        Ok(guarded)
    }
}
