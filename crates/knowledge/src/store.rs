//! SQLite-backed document and message stores.
//!
//! The pipeline only sees the [`DocumentStore`] and [`MessageStore`] traits;
//! [`SqliteStore`] implements both over a single connection.

use crate::types::{Document, Message, NewDocument, Role};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kbase_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Read and write access to stored documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Validate and persist a new document.
    async fn insert(&self, document: NewDocument) -> AppResult<Document>;

    /// Every document from every owner, newest first.
    async fn find_all(&self) -> AppResult<Vec<Document>>;

    /// Documents uploaded by `owner_id`, newest first.
    ///
    /// With `light` set, `content` and the cached embedding are left out.
    async fn list_by_owner(&self, owner_id: &str, light: bool) -> AppResult<Vec<Document>>;

    /// Delete a document if it belongs to `owner_id`.
    async fn delete(&self, id: &str, owner_id: &str) -> AppResult<Option<Document>>;

    /// Cache an embedding together with the model that produced it.
    async fn set_embedding(&self, id: &str, embedding: &[f32], model: &str) -> AppResult<()>;
}

/// Append-only conversation log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(
        &self,
        owner_id: &str,
        role: Role,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> AppResult<Message>;

    /// Messages for `owner_id` in the order they were appended.
    async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<Message>>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    content_truncated INTEGER NOT NULL DEFAULT 0,
    embedding BLOB,
    embedding_model TEXT,
    file_ref TEXT,
    file_kind TEXT,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    owner_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_owner ON messages(owner_id, seq);
"#;

const DOCUMENT_COLUMNS: &str = "id, title, content, content_truncated, embedding, \
     embedding_model, file_ref, file_kind, owner_id, created_at";

/// Document and message store over one SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (and create if needed) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Persistence(format!("Failed to open SQLite database: {}", e)))?;

        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Self::init(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Persistence(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::Persistence(format!("Store lock poisoned: {}", e)))
    }

    fn query_documents(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        light: bool,
    ) -> AppResult<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| document_from_row(row, light))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, document: NewDocument) -> AppResult<Document> {
        document.validate()?;

        let stored = Document {
            id: uuid::Uuid::new_v4().to_string(),
            title: document.title,
            content: document.content,
            content_truncated: document.content_truncated,
            embedding: None,
            embedding_model: None,
            file_ref: document.file_ref,
            file_kind: document.file_kind,
            owner_id: document.owner_id,
            created_at: Utc::now(),
        };

        self.conn()?.execute(
            "INSERT INTO documents (id, title, content, content_truncated, file_ref, file_kind, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stored.id,
                stored.title,
                stored.content,
                stored.content_truncated,
                stored.file_ref,
                stored.file_kind,
                stored.owner_id,
                format_timestamp(&stored.created_at),
            ],
        )?;

        tracing::debug!(doc_id = %stored.id, "Inserted document");
        Ok(stored)
    }

    async fn find_all(&self) -> AppResult<Vec<Document>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents ORDER BY created_at DESC, rowid DESC",
                DOCUMENT_COLUMNS
            ),
            [],
            false,
        )
    }

    async fn list_by_owner(&self, owner_id: &str, light: bool) -> AppResult<Vec<Document>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
                DOCUMENT_COLUMNS
            ),
            params![owner_id],
            light,
        )
    }

    async fn delete(&self, id: &str, owner_id: &str) -> AppResult<Option<Document>> {
        let conn = self.conn()?;

        let existing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM documents WHERE id = ?1 AND owner_id = ?2",
                    DOCUMENT_COLUMNS
                ),
                params![id, owner_id],
                |row| document_from_row(row, false),
            )
            .optional()?;

        if existing.is_some() {
            conn.execute(
                "DELETE FROM documents WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            tracing::info!(doc_id = %id, "Deleted document");
        }

        Ok(existing)
    }

    async fn set_embedding(&self, id: &str, embedding: &[f32], model: &str) -> AppResult<()> {
        let updated = self.conn()?.execute(
            "UPDATE documents SET embedding = ?1, embedding_model = ?2 WHERE id = ?3",
            params![embedding_to_bytes(embedding), model, id],
        )?;

        // The document may have been deleted while it was being embedded
        if updated == 0 {
            tracing::debug!(doc_id = %id, "Embedding not cached: document is gone");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(
        &self,
        owner_id: &str,
        role: Role,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> AppResult<Message> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
        };

        self.conn()?.execute(
            "INSERT INTO messages (id, owner_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                message.owner_id,
                message.role.as_str(),
                message.content,
                format_timestamp(&message.timestamp),
            ],
        )?;

        Ok(message)
    }

    async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, role, content, timestamp FROM messages WHERE owner_id = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![owner_id], |row| {
            let role: String = row.get(2)?;
            let timestamp: String = row.get(4)?;
            Ok(Message {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                role: Role::parse(&role).ok_or_else(|| conversion_error(2, format!("unknown role '{}'", role)))?,
                content: row.get(3)?,
                timestamp: parse_timestamp(4, &timestamp)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }
}

fn document_from_row(row: &Row<'_>, light: bool) -> rusqlite::Result<Document> {
    let embedding: Option<Vec<u8>> = row.get(4)?;
    let created_at: String = row.get(9)?;

    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        content: if light { String::new() } else { row.get(2)? },
        content_truncated: row.get(3)?,
        embedding: match embedding {
            Some(bytes) if !light => {
                Some(bytes_to_embedding(&bytes).map_err(|e| conversion_error(4, e))?)
            }
            _ => None,
        },
        embedding_model: row.get(5)?,
        file_ref: row.get(6)?,
        file_kind: row.get(7)?,
        owner_id: row.get(8)?,
        created_at: parse_timestamp(9, &created_at)?,
    })
}

// Fixed-width UTC so lexical order matches chronological order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e.to_string()))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(AppError::Persistence(message)),
    )
}

/// Little-endian f32 encoding used for the embedding column.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("Invalid embedding bytes length: {}", bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TITLE;
    use tempfile::TempDir;

    fn new_doc(owner: &str, content: &str) -> NewDocument {
        NewDocument {
            title: DEFAULT_TITLE.to_string(),
            content: content.to_string(),
            content_truncated: false,
            file_ref: None,
            file_kind: None,
            owner_id: owner.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_all_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let first = store.insert(new_doc("admin-1", "First document body text.")).await.unwrap();
        let second = store.insert(new_doc("admin-2", "Second document body text.")).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        assert_eq!(all[1].content, "First document body text.");
    }

    #[tokio::test]
    async fn test_insert_rejects_empty_document() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.insert(new_doc("admin-1", "")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument(_)));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_owner_light_omits_content() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(new_doc("admin-1", "Owned by admin one.")).await.unwrap();
        store.insert(new_doc("admin-2", "Owned by admin two.")).await.unwrap();

        let light = DocumentStore::list_by_owner(&store, "admin-1", true).await.unwrap();
        assert_eq!(light.len(), 1);
        assert!(light[0].content.is_empty());

        let full = DocumentStore::list_by_owner(&store, "admin-1", false).await.unwrap();
        assert_eq!(full[0].content, "Owned by admin one.");
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = store.insert(new_doc("admin-1", "Delete me later.")).await.unwrap();

        assert!(store.delete(&doc.id, "admin-2").await.unwrap().is_none());
        assert_eq!(store.find_all().await.unwrap().len(), 1);

        let deleted = store.delete(&doc.id, "admin-1").await.unwrap();
        assert_eq!(deleted.map(|d| d.id), Some(doc.id));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = store.insert(new_doc("admin-1", "Embedded content here.")).await.unwrap();

        store.set_embedding(&doc.id, &[0.25, -1.5, 3.0], "all-minilm").await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all[0].embedding.as_deref(), Some(&[0.25, -1.5, 3.0][..]));
        assert_eq!(all[0].embedding_model.as_deref(), Some("all-minilm"));
    }

    #[tokio::test]
    async fn test_set_embedding_on_missing_document_is_ok() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.set_embedding("gone", &[1.0], "m").await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_in_append_order() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();

        store.append("user-1", Role::User, "Hi", now).await.unwrap();
        store.append("user-2", Role::User, "Other owner", now).await.unwrap();
        store.append("user-1", Role::Bot, "Hello", now).await.unwrap();

        let messages = MessageStore::list_by_owner(&store, "user-1").await.unwrap();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Bot]);
        assert_eq!(messages[1].content, "Hello");
    }

    #[tokio::test]
    async fn test_open_persists_across_connections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".kbase").join("kbase.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(new_doc("admin-1", "Survives a reopen of the db.")).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_bytes_to_embedding_rejects_ragged_input() {
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
        assert_eq!(
            bytes_to_embedding(&embedding_to_bytes(&[1.0, 2.0])).unwrap(),
            vec![1.0, 2.0]
        );
    }
}
