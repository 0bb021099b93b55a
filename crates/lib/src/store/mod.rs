//! The document store: an explicit context object for resolution.
//!
//! A [`Store`] owns the canonical instance of every document it has created or
//! resolved, the [`FieldRegistry`] used to reconstruct fields, the [`Clock`]
//! used for `-lastModified` stamps and the [`StoreConfig`]. Several stores can
//! coexist in one process; nothing here is global.
//!
//! Resolution is batched and coalescing. [`Store::get_docs`] issues at most one
//! remote fetch for all ids it does not hold, and a request for an id whose
//! fetch is already in flight waits for that fetch instead of issuing another.

pub mod config;
pub mod errors;
pub mod remote;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedMutexGuard, watch};
use tracing::{debug, warn};

pub use config::StoreConfig;
pub use errors::StoreError;
pub use remote::{InMemoryRemote, RemoteResolver};

use crate::{
    Clock, Result, SystemClock,
    doc::{AUTHOR, Doc, DocSnapshot, last_modified_key},
    field::{Field, FieldRegistry, Slot},
    id::DocId,
};

/// Outcome broadcast to readers waiting on an in-flight batch.
type FetchOutcome = std::result::Result<(), String>;

enum CacheEntry {
    Ready(Doc),
    Pending(watch::Receiver<Option<FetchOutcome>>),
}

struct StoreInner {
    remote: Arc<dyn RemoteResolver>,
    cache: Mutex<HashMap<DocId, CacheEntry>>,
    registry: FieldRegistry,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    task_locks: Mutex<HashMap<DocId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Shared handle to a document store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// A store with default configuration and the system clock.
    pub fn new(remote: Arc<dyn RemoteResolver>) -> Self {
        Self::with_config(remote, StoreConfig::default())
    }

    pub fn with_config(remote: Arc<dyn RemoteResolver>, config: StoreConfig) -> Self {
        Self::with_clock(remote, config, Arc::new(SystemClock))
    }

    /// A store stamping with `clock`; tests pass a `FixedClock`.
    pub fn with_clock(
        remote: Arc<dyn RemoteResolver>,
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                remote,
                cache: Mutex::new(HashMap::new()),
                registry: FieldRegistry::with_builtin(),
                clock,
                config,
                task_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.inner.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    // Documents.

    /// Creates an empty document with a fresh id, held by this store.
    pub fn create_doc(&self) -> Doc {
        self.create_doc_with_id(DocId::generate())
    }

    /// Creates an empty document with the given id, replacing any cached one.
    pub fn create_doc_with_id(&self, id: impl Into<DocId>) -> Doc {
        let doc = Doc::new(id);
        if let Some(user) = &self.inner.config.current_user {
            doc.set(AUTHOR, user.as_str());
        }
        self.inner
            .cache
            .lock()
            .unwrap()
            .insert(doc.id().clone(), CacheEntry::Ready(doc.clone()));
        debug!(doc = %doc.id(), "created document");
        doc
    }

    /// The cached document for `id`, without fetching.
    pub fn cached(&self, id: &DocId) -> Option<Doc> {
        match self.inner.cache.lock().unwrap().get(id) {
            Some(CacheEntry::Ready(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    /// Every document currently held, ordered by id.
    pub fn cached_docs(&self) -> Vec<Doc> {
        let mut docs: Vec<Doc> = self
            .inner
            .cache
            .lock()
            .unwrap()
            .values()
            .filter_map(|entry| match entry {
                CacheEntry::Ready(doc) => Some(doc.clone()),
                CacheEntry::Pending(_) => None,
            })
            .collect();
        docs.sort_by(|a, b| a.id().cmp(b.id()));
        docs
    }

    /// Resolves a single document. `Ok(None)` if the remote does not know it.
    pub async fn get_doc(&self, id: &DocId) -> Result<Option<Doc>> {
        let mut found = self.get_docs(std::slice::from_ref(id)).await?;
        Ok(found.remove(id))
    }

    /// Like [`Store::get_doc`], but a missing document is an error.
    pub async fn require_doc(&self, id: &DocId) -> Result<Doc> {
        self.get_doc(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.clone() }.into())
    }

    /// Resolves many documents with at most one new remote fetch.
    ///
    /// Ids already cached are answered immediately, ids with a fetch in flight
    /// wait for it, and every remaining id goes into a single batch. Ids the
    /// remote does not return are absent from the result.
    pub async fn get_docs(&self, ids: &[DocId]) -> Result<HashMap<DocId, Doc>> {
        let mut found = HashMap::new();
        let mut waiting = Vec::new();
        let mut to_fetch = Vec::new();
        let mut sender = None;
        {
            let mut cache = self.inner.cache.lock().unwrap();
            let mut seen = HashSet::new();
            for id in ids.iter().filter(|id| seen.insert(*id)) {
                match cache.get(id) {
                    Some(CacheEntry::Ready(doc)) => {
                        found.insert(id.clone(), doc.clone());
                    }
                    Some(CacheEntry::Pending(rx)) => waiting.push((id.clone(), rx.clone())),
                    None => to_fetch.push(id.clone()),
                }
            }
            if !to_fetch.is_empty() {
                let (tx, rx) = watch::channel(None);
                for id in &to_fetch {
                    cache.insert(id.clone(), CacheEntry::Pending(rx.clone()));
                }
                sender = Some(tx);
            }
        }

        if let Some(tx) = sender {
            match self.fetch_batch(&to_fetch).await {
                Ok(docs) => {
                    tx.send_replace(Some(Ok(())));
                    found.extend(docs);
                }
                Err(e) => {
                    self.clear_pending(&to_fetch);
                    tx.send_replace(Some(Err(e.to_string())));
                    return Err(e);
                }
            }
        }

        let mut orphaned = Vec::new();
        for (id, mut rx) in waiting {
            let outcome = rx.wait_for(Option::is_some).await.map(|v| v.clone());
            match outcome {
                Ok(Some(Ok(()))) => {
                    if let Some(doc) = self.cached(&id) {
                        found.insert(id, doc);
                    }
                }
                Ok(Some(Err(reason))) => {
                    return Err(StoreError::ResolutionFailed {
                        ids: vec![id],
                        reason,
                    }
                    .into());
                }
                // The fetching reader was dropped before finishing.
                Ok(None) | Err(_) => orphaned.push(id),
            }
        }
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "refetching abandoned ids");
            self.clear_pending(&orphaned);
            found.extend(self.fetch_batch(&orphaned).await?);
        }

        Ok(found)
    }

    /// Fetches `ids`, materializes the results and records them as ready.
    async fn fetch_batch(&self, ids: &[DocId]) -> Result<HashMap<DocId, Doc>> {
        debug!(count = ids.len(), "fetching documents");
        let snapshots = self.inner.remote.fetch(ids).await.map_err(|e| match e {
            crate::Error::Store(inner @ StoreError::ResolutionFailed { .. }) => inner,
            other => StoreError::ResolutionFailed {
                ids: ids.to_vec(),
                reason: other.to_string(),
            },
        })?;

        let requested: HashSet<&DocId> = ids.iter().collect();
        let mut docs = HashMap::new();
        for snapshot in snapshots {
            if !requested.contains(&snapshot.id) {
                continue;
            }
            let doc = self.materialize(snapshot)?;
            docs.insert(doc.id().clone(), doc);
        }

        let missing: Vec<DocId> = ids
            .iter()
            .filter(|id| !docs.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "remote did not return every requested document");
            self.clear_pending(&missing);
        }
        Ok(docs)
    }

    /// Drops pending markers for `ids`, leaving ready entries alone.
    fn clear_pending(&self, ids: &[DocId]) {
        let mut cache = self.inner.cache.lock().unwrap();
        for id in ids {
            if matches!(cache.get(id), Some(CacheEntry::Pending(_))) {
                cache.remove(id);
            }
        }
    }

    /// Turns a snapshot into a live document held by this store.
    ///
    /// If the id is already cached, the existing instance is refreshed in
    /// place so every placeholder keeps observing the same document.
    pub fn materialize(&self, snapshot: DocSnapshot) -> Result<Doc> {
        let doc = self
            .cached(&snapshot.id)
            .unwrap_or_else(|| Doc::new(snapshot.id.clone()));
        let mut fields = BTreeMap::new();
        for (key, json) in &snapshot.fields {
            let slot = self
                .inner
                .registry
                .decode(json, self)
                .map_err(|e| StoreError::MaterializeFailed {
                    id: snapshot.id.clone(),
                    reason: format!("field '{key}': {e}"),
                })?;
            fields.insert(key.clone(), slot);
        }
        doc.install(fields);
        self.inner
            .cache
            .lock()
            .unwrap()
            .insert(doc.id().clone(), CacheEntry::Ready(doc.clone()));
        Ok(doc)
    }

    /// Resolves every placeholder stored directly in `doc`'s fields and lists.
    pub async fn resolve_placeholders(&self, doc: &Doc) -> Result<()> {
        let mut ids = Vec::new();
        for key in doc.keys() {
            match doc.slot(&key) {
                Some(Slot::Proxy(p)) if p.needs_fetch() => ids.push(p.id().clone()),
                Some(Slot::List(list)) => ids.extend(list.unresolved()),
                _ => {}
            }
        }
        if ids.is_empty() {
            return Ok(());
        }
        let docs = self.get_docs(&ids).await?;
        for key in doc.keys() {
            match doc.slot(&key) {
                Some(Slot::Proxy(p)) => {
                    if let Some(found) = docs.get(p.id()) {
                        p.set_value(found);
                    }
                }
                Some(Slot::List(list)) => {
                    for p in list.slots().iter().filter_map(|s| s.as_proxy()) {
                        if let Some(found) = docs.get(p.id()) {
                            p.set_value(found);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // Timestamps.

    /// Records `<key>-lastModified` on `doc` from this store's clock.
    pub fn stamp(&self, doc: &Doc, key: &str) -> DateTime<Utc> {
        let now = self.now();
        doc.set(&last_modified_key(key), now);
        now
    }

    /// Writes `key` and stamps it.
    pub fn set_stamped(&self, doc: &Doc, key: &str, value: impl Into<Field>) {
        doc.set_stamped(key, value, self.now());
    }

    /// Primary collection key of `doc`, falling back to the configured default.
    pub fn layout_key(&self, doc: &Doc) -> String {
        doc.layout_key(&self.inner.config.default_layout_key)
    }

    /// Serializes every held document.
    pub fn snapshots(&self) -> Vec<DocSnapshot> {
        self.cached_docs().iter().map(Doc::snapshot).collect()
    }

    /// Waits for exclusive use of `id` as a branch task target.
    pub(crate) async fn lock_target(&self, id: &DocId) -> TargetGuard {
        let lock = {
            let mut locks = self.inner.task_locks.lock().unwrap();
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        TargetGuard {
            guard: Some(lock.lock_owned().await),
            store: self.clone(),
            id: id.clone(),
        }
    }
}

/// Exclusive use of a branch task target. The lock entry is dropped with the
/// last guard or waiter.
pub(crate) struct TargetGuard {
    guard: Option<OwnedMutexGuard<()>>,
    store: Store,
    id: DocId,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.store.inner.task_locks.lock().unwrap();
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.inner.cache.lock().unwrap().len();
        f.debug_struct("Store")
            .field("cached", &cached)
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .finish()
    }
}
