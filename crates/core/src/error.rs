//! Error types for keyfold
//!
//! One error enum covers the whole data-access layer. Callers branch on
//! behavior through the capability predicates (`is_not_found`, `is_conflict`,
//! `is_gone`, ...) rather than on variants, because facade operations wrap
//! backend failures in an [`Error::Operation`] context layer.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for keyfold operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for keyfold
#[derive(Debug, Error)]
pub enum Error {
    /// Point lookup found nothing under the key
    #[error("Not found: {key}")]
    NotFound {
        /// Formatted key
        key: String,
    },

    /// A write-time predicate was not satisfied
    ///
    /// `conflict` marks guards that protect against clobbering an existing
    /// record, `gone` marks guards that required a prior record which was
    /// missing or changed.
    #[error("Pre-condition failed for {key} (conflict: {conflict}, gone: {gone})")]
    PreConditionFailed {
        /// Formatted key
        key: String,
        /// The guard protected against overwrite
        conflict: bool,
        /// The guard required a prior record state
        gone: bool,
    },

    /// Missing hash key or malformed composite identity
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// What is wrong with the key
        reason: String,
    },

    /// Record marshal or unmarshal failure
    #[error("Invalid entity {type_name}: {reason}")]
    InvalidEntity {
        /// Rust type of the record
        type_name: String,
        /// What failed
        reason: String,
    },

    /// Schema mismatch: unmapped field or missing key attribute
    #[error("Schema error for {type_name}: {reason}")]
    Schema {
        /// Rust type of the record
        type_name: String,
        /// What failed
        reason: String,
    },

    /// Opaque backend or transport failure
    #[error("Service I/O error: {message}")]
    ServiceIo {
        /// Description of the failure
        message: String,
        /// Underlying transport error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// The call was canceled or its deadline passed
    #[error("Canceled: {reason}")]
    Canceled {
        /// Cancellation reason
        reason: String,
    },

    /// The operation is not valid in the current state or backend
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was rejected
        reason: String,
    },

    /// Failure annotated with the operation and key that produced it
    #[error("{op} {key}: {source}")]
    Operation {
        /// Operation name (get, put, remove, update, match)
        op: &'static str,
        /// Formatted key
        key: String,
        /// The wrapped failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a NotFound error
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Create an InvalidKey error
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Error::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create an InvalidEntity error
    pub fn invalid_entity(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEntity {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a Schema error
    pub fn schema(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a ServiceIo error without a source
    pub fn service_io(message: impl Into<String>) -> Self {
        Error::ServiceIo {
            message: message.into(),
            source: None,
        }
    }

    /// Create a ServiceIo error wrapping a transport error
    pub fn service_io_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::ServiceIo {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a Canceled error
    pub fn canceled(reason: impl Into<String>) -> Self {
        Error::Canceled {
            reason: reason.into(),
        }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Annotate with operation context
    ///
    /// Already annotated errors are returned as is, so a failure carries
    /// exactly one context layer.
    pub fn with_context(self, op: &'static str, key: impl Into<String>) -> Self {
        match self {
            Error::Operation { .. } => self,
            other => Error::Operation {
                op,
                key: key.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying failure, looking through the context layer
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Operation name, if the error carries context
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::Operation { op, .. } => Some(op),
            _ => None,
        }
    }

    /// Point lookup found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound { .. })
    }

    /// A write guard failed
    pub fn is_pre_condition_failed(&self) -> bool {
        matches!(self.root(), Error::PreConditionFailed { .. })
    }

    /// A write guard that protects against overwrite failed
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), Error::PreConditionFailed { conflict: true, .. })
    }

    /// A write guard that requires a prior record failed
    pub fn is_gone(&self) -> bool {
        matches!(self.root(), Error::PreConditionFailed { gone: true, .. })
    }

    /// The key was missing or malformed
    pub fn is_invalid_key(&self) -> bool {
        matches!(self.root(), Error::InvalidKey { .. })
    }

    /// The call was canceled or timed out
    pub fn is_canceled(&self) -> bool {
        matches!(self.root(), Error::Canceled { .. })
    }

    /// The schema does not cover a field or key attribute
    pub fn is_schema(&self) -> bool {
        matches!(self.root(), Error::Schema { .. })
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::service_io_with(e.to_string(), e)
    }
}
