//! Error types for branch tasks.

use thiserror::Error;

/// Errors specific to branch operations.
///
/// Resolution and field errors raised while a task runs propagate as their
/// own [`crate::Error`] variants. A task that fails partway is not rolled
/// back.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BranchError {
    /// A task name other than `pull` or `merge`.
    #[error("Unknown branch action '{action}': expected 'pull' or 'merge'")]
    UnknownAction { action: String },
}

impl BranchError {
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, BranchError::UnknownAction { .. })
    }
}

impl From<BranchError> for crate::Error {
    fn from(err: BranchError) -> Self {
        crate::Error::Branch(err)
    }
}
