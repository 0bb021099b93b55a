//! Error types for document resolution and storage.

use thiserror::Error;

use crate::id::DocId;

/// Errors raised while resolving, loading or saving documents.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote rejected a batched fetch. Every reader waiting on the batch
    /// receives this error.
    #[error("Failed to resolve {} document(s): {reason}", ids.len())]
    ResolutionFailed { ids: Vec<DocId>, reason: String },

    /// A document required by the caller is unknown to the remote.
    #[error("Document not found: {id}")]
    NotFound { id: DocId },

    /// A snapshot could not be turned back into a document.
    #[error("Failed to materialize document {id}: {reason}")]
    MaterializeFailed { id: DocId, reason: String },

    /// A persisted remote file has an unsupported layout.
    #[error("Invalid remote file: {reason}")]
    InvalidFile { reason: String },
}

impl StoreError {
    /// Check if this error indicates a resource was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, StoreError::ResolutionFailed { .. })
    }

    /// Ids involved in the failure, if any.
    pub fn ids(&self) -> Vec<DocId> {
        match self {
            StoreError::ResolutionFailed { ids, .. } => ids.clone(),
            StoreError::NotFound { id } | StoreError::MaterializeFailed { id, .. } => {
                vec![id.clone()]
            }
            StoreError::InvalidFile { .. } => Vec::new(),
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
