//! Error types for the MPI system

use thiserror::Error;

/// Result type alias for MPI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Master Patient Index system
#[derive(Error, Debug)]
pub enum Error {
    /// A raw record could not be normalized into a `PIIRecord` — an
    /// unparseable date, a malformed sex code, or another structural
    /// problem with the input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A caller requested a `Feature` that does not exist, or requested
    /// `external_id` through `field_iter`, which is not a feature.
    #[error("invalid feature: {0}")]
    InvalidFeature(String),

    /// An algorithm config referenced an unknown matcher/rule identifier,
    /// a malformed pass, or a block with an unsupported field or
    /// transformation.
    #[error("invalid algorithm config: {0}")]
    InvalidConfig(String),

    /// An algorithm config file does not exist at the given path.
    #[error("no file exists at path {0}")]
    FileNotFound(String),

    /// An algorithm config file's contents are not valid JSON.
    #[error("the specified file is not valid JSON: {0}")]
    InvalidJson(String),

    /// A transactional failure from the MPI store. The caller may retry;
    /// no partial state remains.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failure acquiring a pooled database connection.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// A blocking value, or another invariant the implementation
    /// guarantees internally, was violated. Fatal — not meant to be
    /// recovered from by a caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn invalid_feature(msg: impl Into<String>) -> Self {
        Error::InvalidFeature(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
