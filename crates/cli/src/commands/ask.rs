//! Ask command handler.
//!
//! Runs one question cycle through the chat pipeline and prints the bot's
//! reply. Both turns are recorded in the owner's history.

use super::print_json;
use clap::Args;
use kbase_core::AppResult;
use kbase_knowledge::Services;
use kbase_llm::ImageAttachment;
use std::path::PathBuf;

/// Ask a question answered from the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Conversation owner the turns are logged under
    #[arg(long, default_value = "cli")]
    pub owner: String,

    /// Attach an image (png, jpeg, webp, gif)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output the full exchange as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        tracing::info!(owner = %self.owner, has_image = self.image.is_some(), "Executing ask command");

        let image = self
            .image
            .as_deref()
            .map(ImageAttachment::from_file)
            .transpose()?;

        let question = self.question.as_deref().unwrap_or_default();
        let exchange = services.chat.send(&self.owner, question, image).await?;

        tracing::debug!(outcome = ?exchange.outcome, "Question answered");

        if self.json {
            print_json(&exchange)?;
        } else {
            println!("{}", exchange.bot_message.content);
        }

        Ok(())
    }
}
