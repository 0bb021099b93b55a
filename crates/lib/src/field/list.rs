//! The ordered container.
//!
//! [`List`] stores a buffer of tagged [`Slot`]s: primitives and owned lists
//! inline, document references as id-only [`ProxyField`] placeholders.
//! Mutators run synchronously and report a [`ListDiff`] through the hook bound
//! by the owner. Reads that need concrete documents are async: they resolve
//! every placeholder they touch through the [`Store`] in one batched fetch
//! before computing a result.
//!
//! ```
//! use docbranch::{Field, List};
//!
//! let mut list = List::new();
//! list.push("a");
//! list.push(2);
//! list.unshift(["z"]);
//! assert_eq!(list.len(), 3);
//! assert_eq!(list.get(0), Some(Field::from("z")));
//!
//! // Range writes of owned composites are refused.
//! assert!(list.fill(List::new(), ..).unwrap_err().is_unsupported());
//! ```

use std::{
    cmp::Ordering,
    collections::HashSet,
    ops::{Bound, Range, RangeBounds},
    sync::{Arc, Mutex},
};

use tracing::debug;

use super::{
    Field, FieldError, ListDiff, ObjectField, Owner, ProxyField, Slot, UpdateHook,
    registry::Registered,
};
use crate::{
    Result,
    id::{DocId, FieldId},
    store::Store,
};

type Sink = Arc<Mutex<Option<UpdateHook>>>;

/// An ordered, ownership-tracking sequence of fields.
///
/// `Clone` produces a detached snapshot: same instance id, same contents, no
/// owner and no hook. A snapshot stored into a document or list takes a fresh
/// id, so an instance id is only ever held by one container. Use
/// [`ObjectField::copy`] for an independent instance up front.
pub struct List {
    id: FieldId,
    slots: Vec<Slot>,
    owner: Option<Owner>,
    sink: Sink,
    snapshot: bool,
}

impl List {
    pub fn new() -> Self {
        Self {
            id: FieldId::generate(),
            slots: Vec::new(),
            owner: None,
            sink: Arc::new(Mutex::new(None)),
            snapshot: false,
        }
    }

    /// Builds a list from stored slots, attaching any nested lists.
    pub fn from_slots(slots: Vec<Slot>) -> Self {
        let mut list = Self::new();
        list.slots = slots.into_iter().map(Slot::claim).collect();
        list.rebind_from(0);
        list
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw stored slots; references appear as placeholders.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get_slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// The field at `index` without forcing resolution.
    ///
    /// Unresolved references come back as [`Field::Dangling`].
    pub fn get(&self, index: usize) -> Option<Field> {
        self.slots.get(index).map(Slot::to_field)
    }

    /// Mutable access to a nested list; its changes are reported as
    /// [`ListDiff::Nested`] through this list.
    pub fn get_list_mut(&mut self, index: usize) -> Option<&mut List> {
        match self.slots.get_mut(index) {
            Some(Slot::List(list)) => Some(list),
            _ => None,
        }
    }

    /// Fields without forcing resolution.
    pub fn fields(&self) -> Vec<Field> {
        self.slots.iter().map(Slot::to_field).collect()
    }

    /// Distinct ids of placeholders that still need a fetch.
    pub fn unresolved(&self) -> Vec<DocId> {
        unresolved_ids(&self.slots)
    }

    pub fn is_resolved(&self) -> bool {
        self.slots
            .iter()
            .all(|s| s.as_proxy().is_none_or(|p| !p.needs_fetch()))
    }

    // Mutators.

    /// Appends one field and returns the new length.
    pub fn push(&mut self, item: impl Into<Field>) -> usize {
        let len = self.len();
        self.splice_slots(len, 0, vec![item.into().into_slot()]);
        self.len()
    }

    /// Appends many fields as a single change.
    pub fn extend<I, T>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<Field>,
    {
        let len = self.len();
        let slots = into_slots(items);
        if !slots.is_empty() {
            self.splice_slots(len, 0, slots);
        }
        self.len()
    }

    pub fn pop(&mut self) -> Option<Field> {
        let last = self.len().checked_sub(1)?;
        self.splice_slots(last, 1, Vec::new())
            .pop()
            .map(Slot::into_field)
    }

    pub fn shift(&mut self) -> Option<Field> {
        if self.is_empty() {
            return None;
        }
        self.splice_slots(0, 1, Vec::new())
            .pop()
            .map(Slot::into_field)
    }

    /// Prepends fields, keeping their order, and returns the new length.
    pub fn unshift<I, T>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<Field>,
    {
        let slots = into_slots(items);
        if !slots.is_empty() {
            self.splice_slots(0, 0, slots);
        }
        self.len()
    }

    pub fn insert(&mut self, index: usize, item: impl Into<Field>) -> Result<()> {
        self.check_index(index, self.len() + 1)?;
        self.splice_slots(index, 0, vec![item.into().into_slot()]);
        Ok(())
    }

    /// Removes and returns the field at `index`, detaching it.
    pub fn remove(&mut self, index: usize) -> Result<Field> {
        self.check_index(index, self.len())?;
        let removed = self.splice_slots(index, 1, Vec::new());
        Ok(removed
            .into_iter()
            .next()
            .map_or(Field::Value(super::Value::Null), Slot::into_field))
    }

    /// Overwrites the slot at `index` and returns the previous field.
    pub fn set(&mut self, index: usize, item: impl Into<Field>) -> Result<Field> {
        self.check_index(index, self.len())?;
        let removed = self.splice_slots(index, 1, vec![item.into().into_slot()]);
        Ok(removed
            .into_iter()
            .next()
            .map_or(Field::Value(super::Value::Null), Slot::into_field))
    }

    /// Removes up to `delete` slots at `index`, inserts `items` in their
    /// place and returns the removed fields.
    pub fn splice<I, T>(&mut self, index: usize, delete: usize, items: I) -> Result<Vec<Field>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Field>,
    {
        self.check_index(index, self.len() + 1)?;
        let delete = delete.min(self.len() - index);
        let slots = into_slots(items);
        if delete == 0 && slots.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .splice_slots(index, delete, slots)
            .into_iter()
            .map(Slot::into_field)
            .collect())
    }

    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.splice_slots(0, self.len(), Vec::new());
        }
    }

    /// Removes the first slot referencing `id`. Returns whether one was found.
    pub fn remove_reference(&mut self, id: &DocId) -> bool {
        match self.slots.iter().position(|s| s.reference_id() == Some(id)) {
            Some(index) => {
                self.splice_slots(index, 1, Vec::new());
                true
            }
            None => false,
        }
    }

    /// Whether any slot references `id`. Never resolves.
    pub fn contains_reference(&self, id: &DocId) -> bool {
        self.slots.iter().any(|s| s.reference_id() == Some(id))
    }

    pub fn reverse(&mut self) {
        self.slots.reverse();
        self.rebind_from(0);
        self.emit_reset();
    }

    /// Sorts in place with a comparator over resolved fields.
    ///
    /// Fails with [`FieldError::Unresolved`] if any reference still needs a
    /// fetch; see [`List::sort_resolved`].
    pub fn sort_by<F>(&mut self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Field, &Field) -> Ordering,
    {
        let pending = self.unresolved();
        if !pending.is_empty() {
            return Err(FieldError::Unresolved {
                operation: "sort".to_string(),
                count: pending.len(),
            }
            .into());
        }
        let fields = self.fields();
        let mut order: Vec<usize> = (0..fields.len()).collect();
        order.sort_by(|&a, &b| compare(&fields[a], &fields[b]));

        let mut old: Vec<Option<Slot>> = std::mem::take(&mut self.slots)
            .into_iter()
            .map(Some)
            .collect();
        self.slots = order.iter().filter_map(|&i| old[i].take()).collect();
        self.rebind_from(0);
        self.emit_reset();
        Ok(())
    }

    /// Resolves every reference, then sorts.
    pub async fn sort_resolved<F>(&mut self, store: &Store, compare: F) -> Result<()>
    where
        F: FnMut(&Field, &Field) -> Ordering,
    {
        self.resolve(store).await?;
        self.sort_by(compare)
    }

    /// Writes copies of a primitive into every slot of `range`.
    ///
    /// References and owned lists cannot be written into more than one slot,
    /// so they fail with [`FieldError::UnsupportedOperation`].
    pub fn fill(&mut self, value: impl Into<Field>, range: impl RangeBounds<usize>) -> Result<()> {
        let value = match value.into() {
            Field::Value(v) => v,
            other => {
                return Err(FieldError::unsupported(
                    "fill",
                    &format!("cannot fill with a {} value", other.type_name()),
                )
                .into());
            }
        };
        let range = self.bounds(range)?;
        for slot in &mut self.slots[range] {
            slot.detach();
            *slot = Slot::Value(value.clone());
        }
        self.emit_reset();
        Ok(())
    }

    /// Copies the slots in `source` to `target`, overwriting what is there.
    ///
    /// Fails with [`FieldError::UnsupportedOperation`] when the source range
    /// contains references or owned lists.
    pub fn copy_within(&mut self, source: impl RangeBounds<usize>, target: usize) -> Result<()> {
        let source = self.bounds(source)?;
        if self.slots[source.clone()]
            .iter()
            .any(|s| !matches!(s, Slot::Value(_)))
        {
            return Err(FieldError::unsupported(
                "copy_within",
                "source range contains references or owned fields",
            )
            .into());
        }
        self.check_index(target, self.len() + 1)?;
        let count = source.len().min(self.len() - target);
        let copies: Vec<Slot> = self.slots[source].iter().take(count).cloned().collect();
        for (offset, copy) in copies.into_iter().enumerate() {
            let slot = &mut self.slots[target + offset];
            slot.detach();
            *slot = copy;
        }
        self.rebind_from(0);
        self.emit_reset();
        Ok(())
    }

    /// Replays a diff onto this list without reporting it.
    pub fn apply(&mut self, diff: &ListDiff) -> std::result::Result<(), FieldError> {
        diff.apply(&mut self.slots)?;
        self.rebind_from(0);
        Ok(())
    }

    // Reads that force resolution.

    /// Resolves every placeholder in the list with one batched fetch.
    pub async fn resolve(&self, store: &Store) -> Result<()> {
        resolve_slots(&self.slots, store).await
    }

    /// Resolves and returns all fields.
    pub async fn resolved_fields(&self, store: &Store) -> Result<Vec<Field>> {
        self.resolve(store).await?;
        Ok(self.fields())
    }

    /// Resolved documents in the list, skipping non-document fields and
    /// references the remote could not find.
    pub async fn docs(&self, store: &Store) -> Result<Vec<crate::Doc>> {
        Ok(self
            .resolved_fields(store)
            .await?
            .into_iter()
            .filter_map(Field::into_doc)
            .collect())
    }

    pub async fn map<T, F>(&self, store: &Store, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Field, usize) -> T,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.iter().enumerate().map(|(i, x)| f(x, i)).collect())
    }

    pub async fn filter<F>(&self, store: &Store, mut predicate: F) -> Result<Vec<Field>>
    where
        F: FnMut(&Field) -> bool,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.into_iter().filter(|f| predicate(f)).collect())
    }

    pub async fn reduce<A, F>(&self, store: &Store, init: A, f: F) -> Result<A>
    where
        F: FnMut(A, &Field) -> A,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.iter().fold(init, f))
    }

    pub async fn find<F>(&self, store: &Store, mut predicate: F) -> Result<Option<Field>>
    where
        F: FnMut(&Field) -> bool,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.into_iter().find(|f| predicate(f)))
    }

    pub async fn find_index<F>(&self, store: &Store, predicate: F) -> Result<Option<usize>>
    where
        F: FnMut(&Field) -> bool,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.iter().position(predicate))
    }

    pub async fn for_each<F>(&self, store: &Store, mut f: F) -> Result<()>
    where
        F: FnMut(&Field, usize),
    {
        let fields = self.resolved_fields(store).await?;
        fields.iter().enumerate().for_each(|(i, x)| f(x, i));
        Ok(())
    }

    pub async fn every<F>(&self, store: &Store, predicate: F) -> Result<bool>
    where
        F: FnMut(&Field) -> bool,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.iter().all(predicate))
    }

    pub async fn some<F>(&self, store: &Store, predicate: F) -> Result<bool>
    where
        F: FnMut(&Field) -> bool,
    {
        let fields = self.resolved_fields(store).await?;
        Ok(fields.iter().any(predicate))
    }

    /// Resolved fields in `range`. Only placeholders inside the range are fetched.
    pub async fn slice(&self, store: &Store, range: impl RangeBounds<usize>) -> Result<Vec<Field>> {
        let range = self.bounds(range)?;
        let slots = &self.slots[range];
        resolve_slots(slots, store).await?;
        Ok(slots.iter().map(Slot::to_field).collect())
    }

    pub async fn contains(&self, store: &Store, needle: &Field) -> Result<bool> {
        Ok(self.index_of(store, needle).await?.is_some())
    }

    /// First index holding `needle`.
    ///
    /// A primitive or list needle is compared against the stored slots
    /// directly. A reference needle forces resolution of the whole list first
    /// and matches by document id, whether given as a [`Field::Doc`] or a
    /// [`Field::Dangling`] id.
    pub async fn index_of(&self, store: &Store, needle: &Field) -> Result<Option<usize>> {
        match searched_reference(needle) {
            None => Ok(self.slots.iter().position(|s| s.matches(needle))),
            Some(id) => {
                self.resolve(store).await?;
                Ok(self.slots.iter().position(|s| s.reference_id() == Some(id)))
            }
        }
    }

    pub async fn last_index_of(&self, store: &Store, needle: &Field) -> Result<Option<usize>> {
        match searched_reference(needle) {
            None => Ok(self.slots.iter().rposition(|s| s.matches(needle))),
            Some(id) => {
                self.resolve(store).await?;
                Ok(self.slots.iter().rposition(|s| s.reference_id() == Some(id)))
            }
        }
    }

    // Internals.

    fn check_index(&self, index: usize, limit: usize) -> Result<()> {
        if index >= limit {
            return Err(FieldError::IndexOutOfBounds {
                index,
                len: self.len(),
            }
            .into());
        }
        Ok(())
    }

    fn bounds(&self, range: impl RangeBounds<usize>) -> Result<Range<usize>> {
        let len = self.len();
        let out_of_bounds = |index: usize| FieldError::IndexOutOfBounds { index, len };
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.checked_add(1).ok_or_else(|| out_of_bounds(s))?,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e.checked_add(1).ok_or_else(|| out_of_bounds(e))?,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        if start > end || end > len {
            return Err(FieldError::IndexOutOfBounds {
                index: end.max(start),
                len,
            }
            .into());
        }
        Ok(start..end)
    }

    /// Single entry point for positional mutation. Bounds are checked by callers.
    fn splice_slots(&mut self, index: usize, delete: usize, items: Vec<Slot>) -> Vec<Slot> {
        let items: Vec<Slot> = items.into_iter().map(Slot::claim).collect();
        let listening = self.is_listening();
        let added = if listening {
            items.iter().map(Slot::copy).collect()
        } else {
            Vec::new()
        };
        let inserted = items.len();
        let mut removed: Vec<Slot> = self.slots.splice(index..index + delete, items).collect();
        removed.iter_mut().for_each(Slot::detach);

        if inserted == delete {
            self.rebind(index..index + inserted);
        } else {
            self.rebind_from(index);
        }

        if listening {
            self.emit(ListDiff::Splice {
                index,
                removed: removed.iter().map(Slot::copy).collect(),
                added,
                length: self.len(),
            });
        }
        removed
    }

    fn rebind_from(&mut self, start: usize) {
        let end = self.len();
        self.rebind(start..end);
    }

    /// Re-attaches nested lists in `range` so their hooks carry the right index.
    fn rebind(&mut self, range: Range<usize>) {
        let parent = self.id;
        for index in range {
            if let Some(Slot::List(child)) = self.slots.get_mut(index) {
                let sink = Arc::clone(&self.sink);
                let hook: UpdateHook = Arc::new(move |diff: ListDiff| {
                    let hook = sink.lock().unwrap().clone();
                    if let Some(hook) = hook {
                        hook(ListDiff::Nested {
                            index,
                            diff: Box::new(diff),
                        });
                    }
                });
                child.attach(
                    Owner::List {
                        list: parent,
                        index,
                    },
                    hook,
                );
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    fn emit(&self, diff: ListDiff) {
        let hook = self.sink.lock().unwrap().clone();
        if let Some(hook) = hook {
            debug!(list = %self.id, length = diff.length(), "list changed");
            hook(diff);
        }
    }

    fn emit_reset(&self) {
        if self.is_listening() {
            self.emit(ListDiff::Reset {
                items: self.slots.iter().map(Slot::copy).collect(),
            });
        }
    }

    fn detached(id: FieldId, slots: Vec<Slot>, snapshot: bool) -> Self {
        let mut list = Self {
            id,
            slots,
            owner: None,
            sink: Arc::new(Mutex::new(None)),
            snapshot,
        };
        list.rebind_from(0);
        list
    }

    /// Prepares this list for storage in a container.
    ///
    /// Snapshots, and snapshots nested inside, take fresh ids.
    pub(crate) fn claim(mut self) -> Self {
        if self.snapshot {
            self.id = FieldId::generate();
            self.snapshot = false;
        }
        for slot in &mut self.slots {
            if let Slot::List(nested) = slot {
                *nested = std::mem::take(nested).claim();
            }
        }
        self.rebind_from(0);
        self
    }
}

fn searched_reference(needle: &Field) -> Option<&DocId> {
    match needle {
        Field::Doc(doc) => Some(doc.id()),
        Field::Dangling(id) => Some(id),
        _ => None,
    }
}

fn into_slots<I, T>(items: I) -> Vec<Slot>
where
    I: IntoIterator<Item = T>,
    T: Into<Field>,
{
    items.into_iter().map(|i| i.into().into_slot()).collect()
}

fn unresolved_ids(slots: &[Slot]) -> Vec<DocId> {
    let mut seen = HashSet::new();
    slots
        .iter()
        .filter_map(Slot::as_proxy)
        .filter(|p| p.needs_fetch())
        .filter(|p| seen.insert(p.id().clone()))
        .map(|p| p.id().clone())
        .collect()
}

/// Resolves every placeholder in `slots` with at most one store request.
async fn resolve_slots(slots: &[Slot], store: &Store) -> Result<()> {
    let proxies: Vec<&ProxyField> = slots
        .iter()
        .filter_map(Slot::as_proxy)
        .filter(|p| p.needs_fetch())
        .collect();
    if proxies.is_empty() {
        return Ok(());
    }
    let ids = unresolved_ids(slots);
    proxies.iter().for_each(|p| p.mark_pending());

    match store.get_docs(&ids).await {
        Ok(docs) => {
            for proxy in proxies {
                match docs.get(proxy.id()) {
                    Some(doc) => proxy.set_value(doc),
                    None => proxy.reset(),
                }
            }
            Ok(())
        }
        Err(e) => {
            proxies.iter().for_each(|p| p.mark_failed());
            Err(e)
        }
    }
}

impl ObjectField for List {
    fn field_id(&self) -> FieldId {
        self.id
    }

    fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    fn attach(&mut self, owner: Owner, hook: UpdateHook) {
        self.owner = Some(owner);
        *self.sink.lock().unwrap() = Some(hook);
    }

    fn detach(&mut self) {
        self.owner = None;
        *self.sink.lock().unwrap() = None;
    }

    fn copy(&self) -> Self {
        Self::detached(FieldId::generate(), self.slots.iter().map(Slot::copy).collect(), false)
    }
}

impl Registered for List {
    fn type_id() -> &'static str {
        "list"
    }
}

impl Clone for List {
    fn clone(&self) -> Self {
        Self::detached(self.id, self.slots.clone(), true)
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl std::fmt::Debug for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("List")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("slots", &self.slots)
            .finish()
    }
}

impl<T: Into<Field>> FromIterator<T> for List {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_slots(into_slots(iter))
    }
}

impl<T: Into<Field>> From<Vec<T>> for List {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}
