//! Error types for sqlport.
//!
//! Every failure the core can report is a variant of [`Error`]. Backend failures keep
//! their original classification even after the batching engine wraps them with batch
//! context, so callers can always tell a timeout from a constraint violation.

use std::fmt;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type.
#[derive(Debug)]
pub enum Error {
    /// Failure to establish or keep a connection.
    Connection(ConnectionError),
    /// A statement was rejected by the backend.
    Query(QueryError),
    /// The backend or the connection timed out.
    Timeout,
    /// A request for a dialect or capability that is not defined.
    Capability(CapabilityError),
    /// The target row changed or disappeared (optimistic-lock failure).
    StaleState(StaleStateError),
    /// A backend failure raised while flushing a batch.
    Batch(BatchError),
    /// Protocol or driver invariant broken.
    Protocol(ProtocolError),
    /// Anything else.
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish the connection.
    Connect,
    /// Authentication failed.
    Authentication,
    /// Connection was lost mid-operation.
    Disconnected,
    /// Server refused the connection.
    Refused,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    /// SQLSTATE code, when the backend reports one.
    pub sqlstate: Option<String>,
    pub sql: Option<String>,
    pub detail: Option<String>,
    /// Index of the failing statement inside a batch, when the backend reports it.
    pub batch_index: Option<usize>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL.
    Syntax,
    /// Unique, foreign key, not-null or check violation.
    Constraint,
    /// Deadlock detected.
    Deadlock,
    /// Serialization failure.
    Serialization,
    /// Statement timeout or lock wait timeout.
    Timeout,
    /// Statement cancelled by the server.
    Cancelled,
    /// Any other database error.
    Database,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityError {
    /// What was being looked up (`"capability"` or `"dialect"`).
    pub subject: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleStateError {
    pub table: String,
    /// Rendered identifier values of the affected row.
    pub identifier: String,
    pub message: String,
}

/// A backend failure wrapped with the batch it happened in.
#[derive(Debug)]
pub struct BatchError {
    pub kind: StatementKind,
    pub table: Option<String>,
    /// Position of the failing entry within the flushed group, when known.
    pub position: Option<usize>,
    /// Number of entries in the flushed group.
    pub batch_size: usize,
    pub sql: String,
    pub source: Box<Error>,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The operation kind of a data-manipulation statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Other => "statement",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Unwrap batch context and return the error the backend actually raised.
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch(b) => b.source.root(),
            other => other,
        }
    }

    /// Whether this is (or wraps) a timeout.
    pub fn is_timeout(&self) -> bool {
        match self.root() {
            Error::Timeout => true,
            Error::Query(q) => q.kind == QueryErrorKind::Timeout,
            _ => false,
        }
    }

    /// Whether this is (or wraps) a connectivity failure.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.root(), Error::Connection(_))
    }

    /// Whether this is (or wraps) a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.root(), Error::Query(q) if q.kind == QueryErrorKind::Constraint)
    }

    /// Whether this is (or wraps) an optimistic-lock failure.
    pub fn is_optimistic_lock_failure(&self) -> bool {
        matches!(self.root(), Error::StaleState(_))
    }

    /// The SQLSTATE code of the underlying backend error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self.root() {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn unknown_capability(name: impl Into<String>) -> Self {
        Error::Capability(CapabilityError {
            subject: "capability",
            name: name.into(),
        })
    }

    pub(crate) fn unknown_dialect(name: impl Into<String>) -> Self {
        Error::Capability(CapabilityError {
            subject: "dialect",
            name: name.into(),
        })
    }
}

impl QueryError {
    /// Build a query error carrying only a kind and message.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sqlstate: None,
            sql: None,
            detail: None,
            batch_index: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    #[must_use]
    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = Some(index);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                write!(f, "Query error: {}", e.message)?;
                if let Some(state) = &e.sqlstate {
                    write!(f, " (SQLSTATE {state})")?;
                }
                Ok(())
            }
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Capability(e) => write!(f, "Unknown {}: {}", e.subject, e.name),
            Error::StaleState(e) => write!(
                f,
                "Row was updated or deleted by another transaction: {} [{}] {}",
                e.table, e.identifier, e.message
            ),
            Error::Batch(e) => {
                write!(f, "Batch {} failed", e.kind)?;
                if let Some(table) = &e.table {
                    write!(f, " on {table}")?;
                }
                match e.position {
                    Some(pos) => write!(f, " at entry {} of {}", pos, e.batch_size)?,
                    None => write!(f, " ({} entries)", e.batch_size)?,
                }
                write!(f, ": {}", e.source)
            }
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Batch(e) => Some(e.source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(inner: Error) -> Error {
        Error::Batch(BatchError {
            kind: StatementKind::Insert,
            table: Some("users".to_string()),
            position: Some(1),
            batch_size: 3,
            sql: "insert into users (id) values (?)".to_string(),
            source: Box::new(inner),
        })
    }

    #[test]
    fn test_timeout_survives_batch_wrapping() {
        let err = wrapped(Error::Timeout);
        assert!(err.is_timeout());
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_constraint_classification() {
        let err = wrapped(Error::Query(
            QueryError::new(QueryErrorKind::Constraint, "duplicate key").with_sqlstate("23505"),
        ));
        assert!(err.is_constraint_violation());
        assert!(!err.is_timeout());
        assert_eq!(err.sqlstate(), Some("23505"));
    }

    #[test]
    fn test_connection_error_is_not_stale_state() {
        let err = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "closed".to_string(),
            source: None,
        });
        assert!(err.is_connection_error());
        assert!(!err.is_optimistic_lock_failure());
    }

    #[test]
    fn test_batch_display_includes_context() {
        let err = wrapped(Error::Timeout);
        let text = err.to_string();
        assert!(text.contains("insert"));
        assert!(text.contains("users"));
        assert!(text.contains("entry 1 of 3"));
    }

    #[test]
    fn test_source_chain_reaches_inner_error() {
        use std::error::Error as _;
        let err = wrapped(Error::Timeout);
        let source = err.source().expect("batch error has a source");
        assert_eq!(source.to_string(), "Operation timed out");
    }
}
