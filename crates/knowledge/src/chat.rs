//! The question-answering pipeline and its conversation log.
//!
//! One call to [`ChatPipeline::send`] runs a full cycle:
//!
//! ```text
//! user turn appended
//!   -> image only?          -> capability message
//!   -> embed + rank         -> no matches -> refusal
//!   -> assemble context
//!   -> guarded generation
//! bot turn appended
//! ```
//!
//! Failures between the two appends are logged and replaced by a generic
//! message, so every user turn is followed by exactly one bot turn.

use crate::context::assemble;
use crate::guard::{AnswerKind, GroundedAnswerGuard, IMAGE_ONLY_MESSAGE, REFUSAL};
use crate::retrieval::Retriever;
use crate::store::MessageStore;
use crate::types::{Message, Role};
use chrono::Utc;
use kbase_core::{AppError, AppResult};
use kbase_llm::ImageAttachment;
use serde::Serialize;
use std::sync::Arc;

/// Stored as the user turn when only an image was sent.
pub const IMAGE_PLACEHOLDER: &str = "[Image uploaded]";

/// Terminal state of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatOutcome {
    ImageOnly,
    NoGrounding,
    Answered,
    Overridden,
    Failed,
}

impl From<AnswerKind> for ChatOutcome {
    fn from(kind: AnswerKind) -> Self {
        match kind {
            AnswerKind::ImageOnly => ChatOutcome::ImageOnly,
            AnswerKind::NoGrounding => ChatOutcome::NoGrounding,
            AnswerKind::Generated => ChatOutcome::Answered,
            AnswerKind::Overridden => ChatOutcome::Overridden,
        }
    }
}

/// The pair of turns produced by one question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub user_message: Message,
    pub bot_message: Message,
    pub outcome: ChatOutcome,
}

pub struct ChatPipeline {
    retriever: Arc<Retriever>,
    guard: Arc<GroundedAnswerGuard>,
    messages: Arc<dyn MessageStore>,
}

impl ChatPipeline {
    pub fn new(
        retriever: Arc<Retriever>,
        guard: Arc<GroundedAnswerGuard>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            retriever,
            guard,
            messages,
        }
    }

    /// Answer one question for `owner_id` and log both turns.
    ///
    /// # Errors
    /// * `InvalidRequest` - neither text nor image; nothing is stored
    /// * `Persistence` - a turn could not be appended
    pub async fn send(
        &self,
        owner_id: &str,
        question: &str,
        image: Option<ImageAttachment>,
    ) -> AppResult<ChatExchange> {
        let question = question.trim();

        if question.is_empty() && image.is_none() {
            return Err(AppError::InvalidRequest(
                "Message or image required".to_string(),
            ));
        }

        let user_content = if question.is_empty() {
            IMAGE_PLACEHOLDER
        } else {
            question
        };
        let user_message = self
            .messages
            .append(owner_id, Role::User, user_content, Utc::now())
            .await?;

        tracing::info!(owner = %owner_id, has_image = image.is_some(), "Question received");

        let (reply, outcome) = match self.respond(question, image.as_ref()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(owner = %owner_id, "Chat pipeline failed: {}", e);
                (e.user_message().to_string(), ChatOutcome::Failed)
            }
        };

        let bot_message = self
            .messages
            .append(owner_id, Role::Bot, &reply, Utc::now())
            .await?;

        tracing::info!(outcome = ?outcome, "Question answered");

        Ok(ChatExchange {
            user_message,
            bot_message,
            outcome,
        })
    }

    async fn respond(
        &self,
        question: &str,
        image: Option<&ImageAttachment>,
    ) -> AppResult<(String, ChatOutcome)> {
        if question.is_empty() {
            return Ok((IMAGE_ONLY_MESSAGE.to_string(), ChatOutcome::ImageOnly));
        }

        let matches = self.retriever.retrieve(question).await?;
        if matches.is_empty() {
            return Ok((REFUSAL.to_string(), ChatOutcome::NoGrounding));
        }

        let context = assemble(&matches);
        let answer = self.guard.answer(question, &context, image).await?;
        Ok((answer.text, answer.kind.into()))
    }

    /// Conversation log for `owner_id`, oldest first.
    pub async fn history(&self, owner_id: &str) -> AppResult<Vec<Message>> {
        self.messages.list_by_owner(owner_id).await
    }
}
