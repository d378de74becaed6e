use thiserror::Error;

/// Errors that can occur while building or querying the reference graph.
#[derive(Error, Debug)]
pub enum LawGraphError {
    #[error("invalid identifier: {message} (value: {value})")]
    InvalidId { message: String, value: String },

    #[error("resolver error: {message} (pattern: {pattern})")]
    Resolver { message: String, pattern: String },

    #[error("repository error: {message} (operation: {operation})")]
    Repository { message: String, operation: String },

    #[error("database error: {message} (operation: {operation})")]
    Database { message: String, operation: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LawGraphError {
    /// Shorthand for an [`LawGraphError::InvalidId`] error.
    pub fn invalid_id(message: impl Into<String>, value: impl Into<String>) -> Self {
        LawGraphError::InvalidId {
            message: message.into(),
            value: value.into(),
        }
    }
}

/// Convenience alias for results using `LawGraphError`.
pub type Result<T> = std::result::Result<T, LawGraphError>;
