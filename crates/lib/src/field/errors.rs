//! Error types for field and container operations.

use thiserror::Error;

/// Errors raised by ObjectField and container operations.
///
/// Container-level errors are reported synchronously at the call site; the
/// container is left unchanged when one is returned.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FieldError {
    /// A mutator cannot express single-slot ownership for the given input.
    #[error("Unsupported operation {operation}: {reason}")]
    UnsupportedOperation { operation: String, reason: String },

    /// Index outside the current length of a list.
    #[error("List index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A document field holds a different kind of field than requested.
    #[error("Field '{key}' type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// A synchronous operation needs concrete values but placeholders are unresolved.
    #[error("{count} reference(s) must be resolved before {operation}")]
    Unresolved { operation: String, count: usize },

    /// A tagged object names a type with no registered decoder.
    #[error("Unknown field type: {type_name}")]
    UnknownType { type_name: String },

    /// A tagged object could not be decoded.
    #[error("Failed to decode field: {reason}")]
    Decode { reason: String },
}

impl FieldError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FieldError::UnsupportedOperation { .. })
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, FieldError::IndexOutOfBounds { .. })
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, FieldError::TypeMismatch { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, FieldError::Unresolved { .. })
    }

    /// Check if this error came from decoding a serialized field.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            FieldError::UnknownType { .. } | FieldError::Decode { .. }
        )
    }

    /// Get the operation name if this error is operation-specific
    pub fn operation(&self) -> Option<&str> {
        match self {
            FieldError::UnsupportedOperation { operation, .. }
            | FieldError::Unresolved { operation, .. } => Some(operation),
            _ => None,
        }
    }

    pub(crate) fn unsupported(operation: &str, reason: &str) -> Self {
        FieldError::UnsupportedOperation {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<FieldError> for crate::Error {
    fn from(err: FieldError) -> Self {
        crate::Error::Field(err)
    }
}
