//! Error taxonomy for case-study section operations.

use uuid::Uuid;

/// Errors produced by the section store, fetchers and editor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SectionError {
    /// Operation attempted before the case study has a persisted identity.
    #[error("case study has not been saved yet")]
    MissingIdentity,

    #[error("section {0} not found")]
    NotFound(Uuid),

    /// Network or query failure reported by the remote store.
    #[error("section store error: {0}")]
    Store(String),

    #[error("unknown component type: {0}")]
    UnknownComponentType(String),
}

impl From<sqlx::Error> for SectionError {
    fn from(err: sqlx::Error) -> Self {
        SectionError::Store(err.to_string())
    }
}

pub type SectionResult<T> = Result<T, SectionError>;
