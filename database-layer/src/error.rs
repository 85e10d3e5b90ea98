use crate::encryption::{DecodeError, EncodingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Document {id} already exists in {collection}")]
    DuplicateId { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Field '{field}' of {collection} does not support equality lookup")]
    LookupNotSupported { collection: String, field: String },

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
