//! Error types for the variant database and the query engine.

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors reported by the library.
///
/// The first five variants form the error taxonomy of the query engine.
/// They indicate either caller misuse or a data integrity problem, and they are always passed to the caller.
/// The remaining variants pass through errors from the storage and I/O layers.
#[derive(Error, Debug)]
pub enum Error {
    /// A malformed argument, such as an unknown unit or an empty required input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A sample, leaf, scheme, sequence, or feature could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A name that should resolve to a single entity resolved to zero or several entities.
    #[error("Ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// An unimplemented combination of arguments or query flavors.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Conflicting records, such as a variant identity with two kinds or a sample inserted twice.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// A malformed line in a text input.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Passes through database errors.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Passes through I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Passes through errors from reading delimited tables.
    #[error("Table error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn ambiguous_match(message: impl Into<String>) -> Self {
        Error::AmbiguousMatch(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedOperation(message.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Error::ConsistencyViolation(message.into())
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse { line, message: message.into() }
    }
}

//-----------------------------------------------------------------------------
