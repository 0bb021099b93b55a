//! Reference placeholders.

use std::sync::{Arc, Mutex};

use super::registry::Registered;
use crate::{
    Result,
    doc::{Doc, WeakDoc},
    id::DocId,
    store::Store,
};

/// Observable resolution state of a [`ProxyField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    /// Only the id is known.
    Unresolved,
    /// A fetch for the id is in flight.
    Pending,
    /// The canonical document is cached.
    Resolved,
    /// The last fetch failed; the next read retries.
    Failed,
}

#[derive(Debug)]
enum ProxyState {
    Unresolved,
    Pending,
    Resolved(WeakDoc),
    Failed,
}

/// Lazily resolved stand-in for a document reference.
///
/// The resolved value is a weak handle to the canonical [`Doc`] owned by the
/// [`Store`] cache, so every placeholder for the same id observes the same
/// instance. Clones of a `ProxyField` share resolution state; [`ProxyField::copy`]
/// starts a fresh one.
#[derive(Debug, Clone)]
pub struct ProxyField {
    id: DocId,
    state: Arc<Mutex<ProxyState>>,
}

impl ProxyField {
    /// Creates an unresolved placeholder.
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(ProxyState::Unresolved)),
        }
    }

    /// Creates a placeholder already resolved to `doc`.
    pub fn resolved(doc: &Doc) -> Self {
        Self {
            id: doc.id().clone(),
            state: Arc::new(Mutex::new(ProxyState::Resolved(doc.downgrade()))),
        }
    }

    pub fn id(&self) -> &DocId {
        &self.id
    }

    pub fn status(&self) -> ProxyStatus {
        match &*self.state.lock().unwrap() {
            ProxyState::Unresolved => ProxyStatus::Unresolved,
            ProxyState::Pending => ProxyStatus::Pending,
            ProxyState::Resolved(weak) if weak.is_live() => ProxyStatus::Resolved,
            ProxyState::Resolved(_) => ProxyStatus::Unresolved,
            ProxyState::Failed => ProxyStatus::Failed,
        }
    }

    /// The cached document, if resolved and still alive.
    pub fn cached(&self) -> Option<Doc> {
        match &*self.state.lock().unwrap() {
            ProxyState::Resolved(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// True when a read must fetch before it can produce a value.
    pub fn needs_fetch(&self) -> bool {
        self.cached().is_none()
    }

    /// Records that a fetch for this id has been issued.
    pub(crate) fn mark_pending(&self) {
        let mut state = self.state.lock().unwrap();
        if !matches!(&*state, ProxyState::Resolved(weak) if weak.is_live()) {
            *state = ProxyState::Pending;
        }
    }

    pub(crate) fn set_value(&self, doc: &Doc) {
        *self.state.lock().unwrap() = ProxyState::Resolved(doc.downgrade());
    }

    pub(crate) fn mark_failed(&self) {
        *self.state.lock().unwrap() = ProxyState::Failed;
    }

    /// Drops any cached value so the next read fetches again.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = ProxyState::Unresolved;
    }

    /// Resolves the reference through `store`.
    ///
    /// Returns `Ok(None)` when the remote does not know the id. Concurrent
    /// readers of the same id share one fetch.
    pub async fn value(&self, store: &Store) -> Result<Option<Doc>> {
        if let Some(doc) = self.cached() {
            return Ok(Some(doc));
        }
        self.mark_pending();
        match store.get_doc(&self.id).await {
            Ok(Some(doc)) => {
                self.set_value(&doc);
                Ok(Some(doc))
            }
            Ok(None) => {
                self.reset();
                Ok(None)
            }
            Err(e) => {
                self.mark_failed();
                Err(e)
            }
        }
    }

    /// Placeholder for the same id with independent state.
    ///
    /// A live cached value is carried over; in-flight and failed states are not.
    pub fn copy(&self) -> Self {
        match self.cached() {
            Some(doc) => Self::resolved(&doc),
            None => Self::new(self.id.clone()),
        }
    }
}

impl Registered for ProxyField {
    fn type_id() -> &'static str {
        "proxy"
    }
}
