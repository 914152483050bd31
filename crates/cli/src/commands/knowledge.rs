//! Knowledge command handler.
//!
//! Adds, lists and deletes the documents answers are grounded on.

use super::print_json;
use clap::{Args, Subcommand};
use kbase_core::{AppError, AppResult};
use kbase_knowledge::{IngestRequest, Services, UploadedFile, ALLOWED_MIME_TYPES};
use std::path::{Path, PathBuf};

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Add a document from a file, text, or both
    Add(KnowledgeAddCommand),
    /// List documents uploaded by an owner
    List(KnowledgeListCommand),
    /// Delete a document
    Delete(KnowledgeDeleteCommand),
}

#[derive(Args, Debug)]
pub struct KnowledgeAddCommand {
    /// Document title
    #[arg(long)]
    pub title: Option<String>,

    /// Text content, appended after any file text
    #[arg(long)]
    pub text: Option<String>,

    /// PDF or plain-text file to extract
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Uploading admin
    #[arg(long, default_value = "admin")]
    pub owner: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeAddCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        tracing::info!(owner = %self.owner, file = ?self.file, "Executing knowledge add command");

        let file = self.file.as_deref().map(read_upload).transpose()?;
        let request = IngestRequest {
            owner_id: self.owner.clone(),
            title: self.title.clone(),
            text: self.text.clone(),
            file,
        };

        let document = match services.ingestor.ingest(request).await {
            Ok(document) => document,
            Err(e) => {
                eprintln!("{}", e.ingest_message());
                return Err(e);
            }
        };

        if self.json {
            print_json(&document)?;
        } else {
            println!(
                "Added '{}' ({}, {} characters{})",
                document.title,
                document.id,
                document.content.chars().count(),
                if document.content_truncated { ", truncated" } else { "" }
            );
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct KnowledgeListCommand {
    /// Uploading admin
    #[arg(long, default_value = "admin")]
    pub owner: String,

    /// Omit document content
    #[arg(long)]
    pub light: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeListCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        let documents = services.ingestor.list(&self.owner, self.light).await?;

        if self.json {
            return print_json(&documents);
        }

        println!("{} document(s) for '{}'", documents.len(), self.owner);
        for doc in &documents {
            println!(
                "- {}  {}  {}",
                doc.id,
                doc.created_at.format("%Y-%m-%d %H:%M"),
                doc.title
            );
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct KnowledgeDeleteCommand {
    /// Document id
    pub id: String,

    /// Uploading admin
    #[arg(long, default_value = "admin")]
    pub owner: String,
}

impl KnowledgeDeleteCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        match services.ingestor.delete(&self.id, &self.owner).await? {
            Some(doc) => {
                println!("Deleted '{}'", doc.title);
                Ok(())
            }
            None => Err(AppError::Knowledge("Document not found".to_string())),
        }
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, services: &Services) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Add(cmd) => cmd.execute(services).await,
            KnowledgeAction::List(cmd) => cmd.execute(services).await,
            KnowledgeAction::Delete(cmd) => cmd.execute(services).await,
        }
    }
}

/// Read a file for upload, taking its MIME type from the extension.
fn read_upload(path: &Path) -> AppResult<UploadedFile> {
    let mime_type = mime_for_path(path)
        .filter(|mime| ALLOWED_MIME_TYPES.contains(mime))
        .ok_or_else(|| {
            AppError::InvalidDocument("Only PDF and TXT files are allowed".to_string())
        })?;

    Ok(UploadedFile {
        bytes: std::fs::read(path)?,
        mime_type: mime_type.to_string(),
        file_ref: None,
    })
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" | "text" | "md" => Some("text/plain"),
        _ => None,
    }
}
