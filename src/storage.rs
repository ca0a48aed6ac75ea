use std::path::PathBuf;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::entities::{Bookmark, BookmarkId, EntityRef, Tag, TagName, User, UserId};
use crate::error::TagmarkError;
use crate::library::{Book, BookId, Quote, QuoteId};

/// One line of the operation log. Replaying every line in order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbOperation {
    CreateUser { user: User },
    DeleteUser { user_id: UserId },
    CreateBook { book: Book },
    DeleteBook { book_id: BookId },
    CreateQuote { quote: Quote },
    DeleteQuote { quote_id: QuoteId },
    CreateTag { tag: Tag },
    CreateBookmark { bookmark: Bookmark },
    DeleteBookmark { bookmark_id: BookmarkId },
    DeleteEntityBookmarks { target: EntityRef },
    AttachTag { bookmark_id: BookmarkId, tag: TagName, at: DateTime<Utc> },
    DetachTag { bookmark_id: BookmarkId, tag: TagName, at: DateTime<Utc> },
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_all(&self) -> Result<Vec<DbOperation>, TagmarkError>;
    async fn write(&mut self, operation: DbOperation) -> Result<(), TagmarkError>;
}

pub struct FileStorage {
    db_path: PathBuf,
}

impl FileStorage {
    pub fn new(db_path: PathBuf) -> anyhow::Result<Self> {
        if !db_path.exists() {
            std::fs::write(&db_path, "")?;
        }
        if !db_path.is_file() {
            anyhow::bail!("db_path is not a file: {}", db_path.display());
        }
        Ok(Self { db_path })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read_all(&self) -> Result<Vec<DbOperation>, TagmarkError> {
        let file_str = tokio::fs::read_to_string(&self.db_path).await
            .map_err(TagmarkError::DbIOError)?;
        let operations = file_str.split('\n')
            .filter(|x| !x.is_empty())
            .map(|x| serde_json::from_str(x).map_err(TagmarkError::DbSerializationError))
            .collect::<Result<Vec<DbOperation>, TagmarkError>>()?;
        Ok(operations)
    }

    async fn write(&mut self, operation: DbOperation) -> Result<(), TagmarkError> {
        let serialized_operation = serde_json::to_string(&operation)
            .map_err(TagmarkError::DbSerializationError)?;
        let line = format!("{}\n", serialized_operation);
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&self.db_path).await
            .map_err(TagmarkError::DbIOError)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await
            .map_err(TagmarkError::DbIOError)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    operations: Vec<DbOperation>,
}

impl InMemoryStorage {
    pub fn with_operations(operations: Vec<DbOperation>) -> Self {
        Self { operations }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn read_all(&self) -> Result<Vec<DbOperation>, TagmarkError> {
        Ok(self.operations.clone())
    }

    async fn write(&mut self, operation: DbOperation) -> Result<(), TagmarkError> {
        self.operations.push(operation);
        Ok(())
    }
}
