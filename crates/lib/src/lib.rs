//!
//! Docbranch: reactive documents with ownership-tracked fields and git-like branching.
//! This library provides the document model, the resolving store and the branch tasks built on them.
//!
//! ## Core Concepts
//!
//! * **Documents (`doc::Doc`)**: Shared, observable maps of named fields. Every change is published as a
//!   `doc::DocUpdate` that can be turned into a patch.
//! * **Object fields (`field::ObjectField`)**: Field values with identity. An object field has at most one
//!   owner at a time, either a document key or a list index, and reports its changes to that owner.
//!     * **Lists (`field::List`)**: Ordered containers that emit `field::ListDiff`s and resolve their
//!       document references lazily, in batches.
//!     * **Proxies (`field::ProxyField`)**: Placeholders for documents referenced by id.
//! * **Store (`store::Store`)**: The resolution context. It owns the canonical instance of every document,
//!   coalesces concurrent fetches into one remote call, and carries the clock, configuration and field registry.
//! * **Branches (`branch`)**: Deep clones linked to their origin through `branchOf`/`branches`, kept in step by
//!   pull and merge tasks that reconcile content with per-field `-lastModified` stamps.

pub mod branch;
pub mod clock;
pub mod doc;
pub mod field;
pub mod id;
pub mod store;

pub use branch::{BranchAction, BranchReport, create_branch, run_branch_task};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use doc::{Doc, DocSnapshot, DocUpdate};
pub use field::{Field, List, ListDiff, ObjectField, ProxyField, Slot, Value};
pub use id::{DocId, FieldId};
pub use store::{InMemoryRemote, RemoteResolver, Store, StoreConfig};

/// Result type used throughout the Docbranch library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Docbranch library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured field errors from the field module
    #[error(transparent)]
    Field(field::FieldError),

    /// Structured store errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured branch errors from the branch module
    #[error(transparent)]
    Branch(branch::BranchError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Field(_) => "field",
            Error::Store(_) => "store",
            Error::Branch(_) => "branch",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a document was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is field-related.
    pub fn is_field_error(&self) -> bool {
        matches!(self, Error::Field(_))
    }

    /// Check if this error is store-related.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Check if this error is branch-related.
    pub fn is_branch_error(&self) -> bool {
        matches!(self, Error::Branch(_))
    }

    /// Check if this error is an operation the field does not support.
    pub fn is_unsupported(&self) -> bool {
        match self {
            Error::Field(field_err) => field_err.is_unsupported(),
            _ => false,
        }
    }

    /// Check if this error is type-related.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Field(field_err) => field_err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error needs references to be resolved first.
    pub fn is_unresolved(&self) -> bool {
        match self {
            Error::Field(field_err) => field_err.is_unresolved(),
            _ => false,
        }
    }

    /// Check if this error is a failed remote resolution.
    pub fn is_resolution_failure(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_resolution_failure(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
