use super::print_json;
use clap::Args;
use kbase_core::{AppResult, HISTORY_FAILURE_MESSAGE};
use kbase_knowledge::{Role, Services};

/// Show a user's conversation history, oldest first
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Conversation owner
    #[arg(long, default_value = "cli")]
    pub owner: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        let messages = match services.chat.history(&self.owner).await {
            Ok(messages) => messages,
            Err(e) => {
                eprintln!("{}", HISTORY_FAILURE_MESSAGE);
                return Err(e);
            }
        };

        if self.json {
            return print_json(&messages);
        }

        if messages.is_empty() {
            println!("No messages for '{}'", self.owner);
        }
        for message in &messages {
            let speaker = match message.role {
                Role::User => "you",
                Role::Bot => "bot",
            };
            println!(
                "[{}] {}: {}",
                message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                speaker,
                message.content
            );
        }

        Ok(())
    }
}
