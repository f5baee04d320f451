//! Error types for Scenesync

use thiserror::Error;

use crate::types::ObjectId;

/// Main error type for Scenesync operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Value cannot be cast to the field's declared kind
    #[error("Type mismatch on '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Fixed-length vector received the wrong number of elements
    #[error("Length mismatch on '{field}': expected {expected} elements, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Value is not a member of the field's enum domain
    #[error("'{value}' is not a valid {domain} for '{field}'")]
    DomainError {
        field: String,
        domain: String,
        value: String,
    },

    /// Numeric value outside the field's min/max bounds
    #[error("Value {value} out of range for '{field}' (allowed {min}..={max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Array shape does not satisfy the field's shape constraint
    #[error("Shape mismatch on '{field}': expected {expected}, got {actual:?}")]
    ShapeMismatch {
        field: String,
        expected: String,
        actual: Vec<usize>,
    },

    /// Binary buffer length disagrees with dtype x shape
    #[error("Buffer size mismatch on '{field}': expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Nested object is not registered with the graph
    #[error("Field '{field}' references an unregistered {type_name}")]
    UnregisteredReference { field: String, type_name: String },

    /// Assignment would close a reference cycle
    #[error("Assigning {held} to {holder}.{field} would create a reference cycle")]
    CyclicReference {
        holder: String,
        field: String,
        held: ObjectId,
    },

    /// Mutation attempted after the session was closed
    #[error("Session for {0} is closed")]
    SessionClosed(String),

    /// Pending changes could not be delivered before close
    #[error("Flush abandoned for {object_id}: {fields:?} not delivered")]
    FlushAbandoned {
        object_id: ObjectId,
        fields: Vec<String>,
    },

    /// Identity does not resolve to a registered object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Type does not declare the field
    #[error("{type_name} has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    /// Type name is not in the schema registry
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Transport cannot accept a message right now; retry on the next flush
    #[error("Transport not ready for {0}")]
    Backpressure(ObjectId),

    /// Transport failed (peer unreachable, channel closed)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed wire header
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Transport conditions leave dirty fields in place and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Backpressure(_) | SyncError::Transport(_))
    }

    /// Shorthand used by coercion code.
    pub(crate) fn type_mismatch(
        field: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        SyncError::TypeMismatch {
            field: field.to_string(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
