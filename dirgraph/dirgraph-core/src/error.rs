//! Error types for the dirgraph system.
//!
//! Every failure surfaced by the synchronizer is a [`DirGraphError`]: a kind
//! tag, the operation that failed, and a human readable message naming the
//! offending path, type or record. Embedded store failures keep their own
//! [`StoreError`] taxonomy and are carried through unchanged as the source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for dirgraph operations.
pub type Result<T> = std::result::Result<T, DirGraphError>;

/// Result type alias for embedded store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a [`DirGraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid or missing configuration
    Configuration,
    /// Required types did not resolve within the retry ceiling
    TypesUnavailable,
    /// A type descriptor was missing while stamping a record
    TypeError,
    /// The configured directory does not exist
    DirectoryNotFound,
    /// The configured path exists but is not a directory
    NotADirectory,
    /// The directory or an entry could not be read due to permissions
    AccessDenied,
    /// Any other filesystem failure
    Io,
    /// Failure reported by the embedded store
    Store,
    /// The emitter could not list the assets to publish
    EmissionFailed,
    /// A lifecycle operation was invalid for the current state
    InvalidState,
    /// The operation observed cancellation
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::TypesUnavailable => "types unavailable",
            Self::TypeError => "type",
            Self::DirectoryNotFound => "directory not found",
            Self::NotADirectory => "not a directory",
            Self::AccessDenied => "access denied",
            Self::Io => "io",
            Self::Store => "store",
            Self::EmissionFailed => "emission",
            Self::InvalidState => "invalid state",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the dirgraph system.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error in {operation}: {message}")]
pub struct DirGraphError {
    kind: ErrorKind,
    operation: String,
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl DirGraphError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, "configure", msg)
    }

    /// Create a new types-unavailable error
    pub fn types_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypesUnavailable, "resolve_all", msg)
    }

    /// Create a new type error for an unresolved type name
    pub fn type_error(operation: impl Into<String>, type_name: &str) -> Self {
        Self::new(
            ErrorKind::TypeError,
            operation,
            format!("type '{}' is not known to the catalog", type_name),
        )
    }

    /// Create a new emission error
    pub fn emission(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmissionFailed, "emit_all", msg)
    }

    /// Create a new invalid state error
    pub fn invalid_state(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, operation, msg)
    }

    /// Create a new cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, operation, "operation was cancelled")
    }

    /// Create a filesystem error, classified from the io error kind
    pub fn filesystem(
        operation: impl Into<String>,
        path: &std::path::Path,
        err: std::io::Error,
    ) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::DirectoryNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
            _ => ErrorKind::Io,
        };
        Self::new(kind, operation, format!("{}: {}", path.display(), err)).with_source(err)
    }

    /// Wrap a store failure for the given operation
    pub fn store(operation: impl Into<String>, err: StoreError) -> Self {
        let message = err.to_string();
        Self::new(ErrorKind::Store, operation, message).with_source(err)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The embedded store error this error carries, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_ref().and_then(|s| s.downcast_ref::<StoreError>())
    }

    /// Fatal errors stop the scheduler instead of abandoning a single cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Configuration | ErrorKind::TypesUnavailable)
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Key used to recognise repeated identical failures
    pub fn fingerprint(&self) -> (ErrorKind, String) {
        (self.kind, self.operation.clone())
    }
}

/// Errors reported by an embedded store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Node not known: {0}")]
    NodeNotKnown(String),

    #[error("Edge not known: {0}")]
    EdgeNotKnown(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Conflict on {guid}: {message}")]
    Conflict { guid: String, message: String },

    /// A reference copy was submitted whose home is the store itself
    #[error("Record {guid} is homed in collection {collection_id}, cannot save as reference copy")]
    HomeCollection { guid: String, collection_id: String },

    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn conflict(guid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            guid: guid.into(),
            message: message.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Check if the store could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Errors reported by an event sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Sink is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SinkError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
