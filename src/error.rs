use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagmarkError {
    #[error("Failed to read/write DB file: {0}")]
    DbIOError(std::io::Error),
    #[error("Failed to serialize/deserialize DB operation: {0}")]
    DbSerializationError(serde_json::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),
    #[error("User {0} still owns bookmarks or books and cannot be deleted")]
    ProtectedUser(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Failed to render template: {0}")]
    Template(#[from] askama::Error),
}
