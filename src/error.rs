//! Error taxonomy for the reconciliation pipeline.
//!
//! Every failure mode surfaces as one variant of [`Error`]. All variants are
//! fatal to the current invocation; the core never retries internally except
//! for the advisory-lock polling loop in the executor.

use thiserror::Error;

/// Driver-level error details attached to a failed DDL statement.
///
/// PostgreSQL populates all fields from the server error response; SQLite
/// fills `code` and `message` only.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DbErrorInfo {
    /// SQLSTATE (PostgreSQL) or extended result code (SQLite).
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based character position into the failing statement, if reported.
    pub position: Option<u32>,
}

impl std::fmt::Display for DbErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(detail) = &self.detail {
            write!(f, "\n  detail: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed SQL in the desired schema. Line/column point at the first
    /// offending token when the driver reports a cursor position.
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Two definitions of the same object in the desired schema.
    #[error("duplicate definition of {kind} {name}")]
    DuplicateObject { kind: &'static str, name: String },

    /// An object references a schema outside the managed set.
    #[error(
        "{kind} {name} belongs to schema {schema} which is not managed; \
         pass --schemas {schema} to manage it"
    )]
    SchemaNotManaged {
        kind: &'static str,
        name: String,
        schema: String,
    },

    /// The desired catalog violates a provider rule.
    #[error("validation failed: {message}")]
    Validation {
        code: &'static str,
        message: String,
        suggestion: Option<String>,
    },

    /// The change is expressible but would destroy data or ordering.
    #[error("unsafe change to {object}: {message}")]
    UnsafeChange { object: String, message: String },

    /// The resolver could not produce an order even after cycle-breaking.
    /// This indicates a bug in the resolver, not a user error.
    #[error("internal dependency resolver error: unresolved cycles {cycles:?}")]
    Dependency { cycles: Vec<Vec<String>> },

    /// The database rejected a DDL statement; the transaction was rolled
    /// back and the database is unchanged.
    #[error("migration failed on statement `{statement}`: {db}")]
    Migration { statement: String, db: DbErrorInfo },

    /// A concurrent-tail statement failed after the transaction committed.
    /// The database is partially updated; the boundary is recorded.
    #[error(
        "partially applied: {} statement(s) committed, failed on `{failed}` ({db}); \
         {} statement(s) skipped",
        succeeded.len(),
        skipped.len()
    )]
    PartiallyApplied {
        /// Statements that executed successfully (transaction + any earlier
        /// concurrent statements).
        succeeded: Vec<String>,
        failed: String,
        db: DbErrorInfo,
        skipped: Vec<String>,
    },

    /// Advisory lock not acquired within the caller's timeout.
    #[error("could not acquire advisory lock {lock_name} within {waited_ms} ms; retry later")]
    LockTimeout { lock_name: String, waited_ms: u64 },

    /// Connection establishment or non-statement database I/O failed.
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a validation error with a suggestion.
    pub fn validation(
        code: &'static str,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Error::Validation {
            code,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
