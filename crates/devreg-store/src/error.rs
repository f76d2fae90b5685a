//! Error types for the metadata store.

use thiserror::Error;

/// Result type alias for metadata store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during metadata store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} name already in use: {name}")]
    NotUnique { kind: &'static str, name: String },

    /// A reference did not resolve, either when writing `owner` or when
    /// hydrating it on read.
    #[error("could not resolve {kind} {key} for {owner}")]
    InvalidReference {
        kind: &'static str,
        key: String,
        owner: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid_reference(
        kind: &'static str,
        key: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self::InvalidReference {
            kind,
            key: key.into(),
            owner: owner.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_not_unique(&self) -> bool {
        matches!(self, Self::NotUnique { .. })
    }

    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidReference { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
