use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("at least one file is required")]
    NoFiles,
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("asset index {index} out of range (draft has {len} assets)")]
    AssetIndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("record error: {0}")]
    Record(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not signed in")]
    Unauthenticated,
}

impl CoreError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn record(err: impl std::fmt::Display) -> Self {
        Self::Record(err.to_string())
    }

    /// Stable short name of the error kind, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
            Self::Record(_) => "record",
            Self::Auth(_) => "auth",
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}
