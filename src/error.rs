//! Crate-wide error hierarchy.
//!
//! Four kinds, matching the failure modes a caller actually needs to tell
//! apart: a declared field type that cannot be mapped to SQL, a primary/unique
//! conflict surfaced unchanged from the engine, a malformed query caught
//! before any I/O happens, and everything else the underlying transport
//! rejected with.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the query compiler, caster, synchronizer, and drivers.
#[derive(Debug, Error)]
pub enum Error {
    /// A declared field type cannot be mapped to the target dialect. Fatal at
    /// `prepare` time.
    #[error("schema mismatch in table `{table}`, field `{field}`: {message}")]
    SchemaMismatch {
        table: String,
        field: String,
        message: String,
    },

    /// A primary or unique-index conflict on insert. Surfaced to the caller
    /// unchanged from the underlying engine.
    #[error("duplicate entry in table `{table}`: {message}")]
    DuplicateEntry { table: String, message: String },

    /// An unsupported operator shape, e.g. `$el` applied to a non-scalar,
    /// non-array value. Raised synchronously at compile time, before any I/O.
    #[error("malformed query: {0}")]
    QueryMalformed(String),

    /// A wrapped transport/engine error. The offending SQL is attached only
    /// to the diagnostic field, never interpolated into the Display message,
    /// so it cannot leak into caller-facing error payloads.
    #[error("storage error: {source}")]
    StorageError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// The SQL that was being executed. Diagnostic only — log it, don't
        /// display it to end users.
        sql: Option<String>,
    },
}

impl Error {
    pub fn schema_mismatch(
        table: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::SchemaMismatch {
            table: table.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn duplicate_entry(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DuplicateEntry {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn query_malformed(message: impl Into<String>) -> Self {
        Error::QueryMalformed(message.into())
    }

    pub fn storage(
        source: impl std::error::Error + Send + Sync + 'static,
        sql: Option<String>,
    ) -> Self {
        Error::StorageError {
            source: Box::new(source),
            sql,
        }
    }

    /// The offending SQL, if this is a storage error that carried one.
    /// Intended for diagnostic logging, not for display to end users.
    pub fn diagnostic_sql(&self) -> Option<&str> {
        match self {
            Error::StorageError { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        if is_sqlite_constraint_violation(&e) {
            return Error::DuplicateEntry {
                table: String::new(),
                message: e.to_string(),
            };
        }
        Error::storage(e, None)
    }
}

fn is_sqlite_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            // MySQL error 1062: ER_DUP_ENTRY
            if db_err.code().as_deref() == Some("23000") {
                return Error::DuplicateEntry {
                    table: String::new(),
                    message: db_err.message().to_string(),
                };
            }
        }
        Error::storage(e, None)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::storage(e, None)
    }
}
