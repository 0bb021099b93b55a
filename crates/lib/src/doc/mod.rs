//! Documents: keyed field maps addressable by id.
//!
//! A [`Doc`] is a cheap, shared handle. Cloning the handle does not copy the
//! document; two handles are equal only if they point at the same instance.
//! Every write publishes a [`DocUpdate`] to subscribers.
//!
//! Documents are created through a [`Store`], which keeps the canonical
//! instance for each id. Document references stored in fields hold only a
//! weak link to that instance.

mod snapshot;
mod update;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, Weak},
};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

pub use snapshot::DocSnapshot;
pub use update::{DocUpdate, FieldChange};

use crate::{
    Result,
    field::{
        Field, FieldError, List, ListDiff, ObjectField, Owner, ProxyField, Slot, UpdateHook,
        Value, registry::encode_slot,
    },
    id::DocId,
    store::Store,
};

/// Field naming the primary collection of a document.
pub const LAYOUT_KEY: &str = "layoutKey";
/// Reference to the container a document currently lives in.
pub const CONTEXT: &str = "context";
/// Reference from a branch document to its origin.
pub const BRANCH_OF: &str = "branchOf";
/// List of documents branched from this one.
pub const BRANCHES: &str = "branches";
/// Reference from a clone to the document it was cloned from.
pub const CLONE_OF: &str = "cloneOf";
/// Reference from an annotation to the document it annotates.
pub const ANNOTATION_ON: &str = "annotationOn";
/// Author recorded on documents created through a store.
pub const AUTHOR: &str = "author";

const UPDATE_CAPACITY: usize = 256;

/// Companion timestamp key for `key`.
///
/// ```
/// assert_eq!(docbranch::doc::last_modified_key("data"), "data-lastModified");
/// ```
pub fn last_modified_key(key: &str) -> String {
    format!("{key}-lastModified")
}

/// Where [`Doc::add_doc_to_list`] places a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListInsert {
    #[default]
    Back,
    Front,
}

struct DocInner {
    id: DocId,
    fields: Mutex<BTreeMap<String, Slot>>,
    updates: broadcast::Sender<DocUpdate>,
}

/// Shared handle to a document.
#[derive(Clone)]
pub struct Doc {
    inner: Arc<DocInner>,
}

/// Non-owning handle, held by placeholders.
#[derive(Clone)]
pub(crate) struct WeakDoc(Weak<DocInner>);

impl WeakDoc {
    pub(crate) fn upgrade(&self) -> Option<Doc> {
        self.0.upgrade().map(|inner| Doc { inner })
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl std::fmt::Debug for WeakDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.upgrade() {
            Some(inner) => write!(f, "WeakDoc({})", inner.id),
            None => f.write_str("WeakDoc(<dropped>)"),
        }
    }
}

impl Doc {
    pub(crate) fn new(id: impl Into<DocId>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            inner: Arc::new(DocInner {
                id: id.into(),
                fields: Mutex::new(BTreeMap::new()),
                updates,
            }),
        }
    }

    pub fn id(&self) -> &DocId {
        &self.inner.id
    }

    pub(crate) fn downgrade(&self) -> WeakDoc {
        WeakDoc(Arc::downgrade(&self.inner))
    }

    /// Receives every subsequent change to this document.
    pub fn subscribe(&self) -> broadcast::Receiver<DocUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.lock().unwrap().keys().cloned().collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.fields.lock().unwrap().contains_key(key)
    }

    /// Stored form of a field. Lists come back as detached snapshots.
    pub fn slot(&self, key: &str) -> Option<Slot> {
        self.inner.fields.lock().unwrap().get(key).cloned()
    }

    /// A field without forcing resolution; see [`Slot::to_field`].
    pub fn field(&self, key: &str) -> Option<Field> {
        self.slot(key).map(Slot::into_field)
    }

    // Typed casts.

    pub fn get_value(&self, key: &str) -> Option<Value> {
        match self.inner.fields.lock().unwrap().get(key) {
            Some(Slot::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get_value(key)
            .and_then(|v| v.as_text().map(str::to_string))
    }

    pub fn get_text_or(&self, key: &str, default: &str) -> String {
        self.get_text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_value(key)
            .and_then(|v| v.as_int())
            .unwrap_or(default)
    }

    /// Numeric field as `f64`; integers are widened.
    pub fn get_number_or(&self, key: &str, default: f64) -> f64 {
        self.get_value(key)
            .and_then(|v| v.as_number())
            .unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_value(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn get_date(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_value(key).and_then(|v| v.as_date())
    }

    /// Snapshot of the list stored under `key`, if that field is a list.
    pub fn get_list(&self, key: &str) -> Option<List> {
        match self.inner.fields.lock().unwrap().get(key) {
            Some(Slot::List(list)) => Some(list.clone()),
            _ => None,
        }
    }

    /// The placeholder stored under `key`, if that field is a reference.
    pub fn reference(&self, key: &str) -> Option<ProxyField> {
        match self.inner.fields.lock().unwrap().get(key) {
            Some(Slot::Proxy(proxy)) => Some(proxy.clone()),
            _ => None,
        }
    }

    /// Primary collection key of this document.
    pub fn layout_key(&self, default: &str) -> String {
        self.get_text_or(LAYOUT_KEY, default)
    }

    pub fn last_modified(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_date(&last_modified_key(key))
    }

    // Reads that may resolve.

    /// A field with any reference resolved through `store`.
    pub async fn get(&self, key: &str, store: &Store) -> Result<Option<Field>> {
        let Some(slot) = self.slot(key) else {
            return Ok(None);
        };
        match slot {
            Slot::Proxy(proxy) => Ok(Some(match proxy.value(store).await? {
                Some(doc) => Field::Doc(doc),
                None => Field::Dangling(proxy.id().clone()),
            })),
            other => Ok(Some(other.into_field())),
        }
    }

    /// The document referenced by `key`, or `None` if unset, not a
    /// reference, or unknown to the remote.
    pub async fn get_doc(&self, key: &str, store: &Store) -> Result<Option<Doc>> {
        match self.reference(key) {
            Some(proxy) => proxy.value(store).await,
            None => Ok(None),
        }
    }

    /// The origin this document was branched from. `None` means it is its
    /// own master.
    pub async fn branch_of(&self, store: &Store) -> Result<Option<Doc>> {
        self.get_doc(BRANCH_OF, store).await
    }

    /// Documents in the list under `key`, resolved with one batched fetch.
    ///
    /// Missing keys and non-list fields yield an empty vector.
    pub async fn docs(&self, key: &str, store: &Store) -> Result<Vec<Doc>> {
        match self.get_list(key) {
            Some(list) => list.docs(store).await,
            None => Ok(Vec::new()),
        }
    }

    // Writes.

    /// Assigns a field.
    ///
    /// Documents are stored as placeholders; assigning the reference already
    /// stored is a no-op. Lists are attached to this document and the value
    /// they replace is detached.
    pub fn set(&self, key: &str, value: impl Into<Field>) {
        self.set_slot(key, value.into().into_slot());
    }

    /// Assigns a field in stored form.
    pub fn set_slot(&self, key: &str, slot: Slot) {
        let mut slot = slot.claim();
        let mut fields = self.inner.fields.lock().unwrap();
        match (fields.get(key), &slot) {
            (Some(Slot::Proxy(old)), Slot::Proxy(new)) if old.id() == new.id() => {
                if let Some(doc) = new.cached() {
                    old.set_value(&doc);
                }
                return;
            }
            (Some(Slot::Value(old)), Slot::Value(new)) if old == new => return,
            _ => {}
        }
        if let Slot::List(list) = &mut slot {
            list.attach(self.owner_for(key), self.field_hook(key));
        }
        let event = self.is_observed().then(|| slot.copy());
        if let Some(mut old) = fields.insert(key.to_string(), slot) {
            old.detach();
        }
        drop(fields);

        trace!(doc = %self.id(), key, "field set");
        if let Some(slot) = event {
            self.publish(key, FieldChange::Set(slot));
        }
    }

    /// Removes a field, detaching any list stored there.
    pub fn unset(&self, key: &str) -> Option<Slot> {
        let removed = self.inner.fields.lock().unwrap().remove(key);
        removed.map(|mut slot| {
            slot.detach();
            self.publish(key, FieldChange::Unset);
            slot
        })
    }

    /// Removes the list stored under `key` and returns it detached.
    pub fn take_list(&self, key: &str) -> Option<List> {
        if !matches!(self.slot(key), Some(Slot::List(_))) {
            return None;
        }
        match self.unset(key) {
            Some(Slot::List(list)) => Some(list),
            _ => None,
        }
    }

    /// Writes `key` and its `-lastModified` companion together.
    pub fn set_stamped(&self, key: &str, value: impl Into<Field>, at: DateTime<Utc>) {
        self.set(key, value);
        self.set(&last_modified_key(key), at);
    }

    /// Mutates the list under `key` in place, creating it when absent.
    ///
    /// Changes made by `f` are published as list diffs. `f` must not access
    /// this document.
    pub fn list_mut<R>(&self, key: &str, f: impl FnOnce(&mut List) -> R) -> Result<R> {
        let mut fields = self.inner.fields.lock().unwrap();
        let mut created = false;
        let slot = fields.entry(key.to_string()).or_insert_with(|| {
            created = true;
            let mut list = List::new();
            list.attach(self.owner_for(key), self.field_hook(key));
            Slot::List(list)
        });
        if created {
            self.publish(key, FieldChange::Set(Slot::List(List::new())));
        }
        match slot {
            Slot::List(list) => Ok(f(list)),
            other => Err(FieldError::TypeMismatch {
                key: key.to_string(),
                expected: "list".to_string(),
                actual: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Adds a document reference to the list under `key` unless one with
    /// the same id is already present. Returns whether it was added.
    pub fn add_doc_to_list(&self, key: &str, doc: &Doc, at: ListInsert) -> Result<bool> {
        self.list_mut(key, |list| {
            if list.contains_reference(doc.id()) {
                return false;
            }
            match at {
                ListInsert::Back => {
                    list.push(doc);
                }
                ListInsert::Front => {
                    list.unshift([doc]);
                }
            }
            true
        })
    }

    /// Removes the reference to `doc` from the list under `key`.
    pub fn remove_doc_from_list(&self, key: &str, doc: &Doc) -> Result<bool> {
        if !self.has(key) {
            return Ok(false);
        }
        self.list_mut(key, |list| list.remove_reference(doc.id()))
    }

    /// Adds `child` to the collection under `key` and points its context here.
    pub fn add_child(&self, key: &str, child: &Doc) -> Result<bool> {
        let added = self.add_doc_to_list(key, child, ListInsert::Back)?;
        child.set(CONTEXT, self);
        Ok(added)
    }

    /// Removes `child` from the collection under `key`, clearing its context
    /// if it pointed here.
    pub fn remove_child(&self, key: &str, child: &Doc) -> Result<bool> {
        let removed = self.remove_doc_from_list(key, child)?;
        if child
            .reference(CONTEXT)
            .is_some_and(|ctx| ctx.id() == self.id())
        {
            child.unset(CONTEXT);
        }
        Ok(removed)
    }

    /// Serializes all fields into tagged JSON.
    pub fn snapshot(&self) -> DocSnapshot {
        let fields = self.inner.fields.lock().unwrap();
        DocSnapshot {
            id: self.id().clone(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), encode_slot(v)))
                .collect(),
        }
    }

    /// Replaces all fields without publishing, attaching any lists.
    pub(crate) fn install(&self, decoded: BTreeMap<String, Slot>) {
        let mut fields = self.inner.fields.lock().unwrap();
        let previous = std::mem::take(&mut *fields);
        for (key, mut slot) in decoded {
            if let Slot::List(list) = &mut slot {
                list.attach(self.owner_for(&key), self.field_hook(&key));
            }
            fields.insert(key, slot);
        }
        previous.into_values().for_each(|mut slot| slot.detach());
    }

    fn owner_for(&self, key: &str) -> Owner {
        Owner::Doc {
            doc: self.id().clone(),
            key: key.to_string(),
        }
    }

    fn field_hook(&self, key: &str) -> UpdateHook {
        let updates = self.inner.updates.clone();
        let doc = self.id().clone();
        let key = key.to_string();
        Arc::new(move |diff: ListDiff| {
            let _ = updates.send(DocUpdate {
                doc: doc.clone(),
                key: key.clone(),
                change: FieldChange::List(diff),
            });
        })
    }

    fn is_observed(&self) -> bool {
        self.inner.updates.receiver_count() > 0
    }

    fn publish(&self, key: &str, change: FieldChange) {
        // No subscribers is not an error.
        let _ = self.inner.updates.send(DocUpdate {
            doc: self.id().clone(),
            key: key.to_string(),
            change,
        });
    }
}

impl PartialEq for Doc {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Doc {}

impl std::hash::Hash for Doc {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl std::fmt::Debug for Doc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Doc({})", self.inner.id)
    }
}
