use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can surface. One operation produces at most one
/// error; nothing is retried and no error leaves a table partially mutated
/// beyond the per-row granularity documented on [crate::table::Table].
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed statement text. Carries the character offset and a
    /// description of the offending input.
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A value could not be coerced to its column's declared type.
    #[error("type error: {0}")]
    Type(String),

    /// An insert payload is missing a column the schema requires.
    #[error("column {0} required")]
    MissingColumn(String),

    /// No principal is logged in.
    #[error("must login first")]
    AuthRequired,

    /// The principal is authenticated but lacks the global role or the
    /// per-table permission the operation needs.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unknown table, column, or user.
    #[error("{0} does not exist")]
    NotFound(String),

    /// Name collision on create, rename, add-column, or add-user.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Sealing or opening an encrypted table set failed.
    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}
