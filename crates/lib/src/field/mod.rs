//! Field taxonomy: primitives, owned composites and document references.
//!
//! A document field (or list slot) holds one of three kinds of data:
//!
//! * a primitive [`Value`],
//! * an owned composite implementing [`ObjectField`] (currently [`List`]),
//! * a reference to another document, stored as a [`ProxyField`] placeholder.
//!
//! [`Slot`] is the stored form, where references are id-only placeholders.
//! [`Field`] is the resolved form handed to readers, where references are
//! concrete [`Doc`] handles.

pub mod diff;
pub mod errors;
pub mod list;
pub mod proxy;
pub mod registry;
pub mod value;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use diff::ListDiff;
pub use errors::FieldError;
pub use list::List;
pub use proxy::{ProxyField, ProxyStatus};
pub use registry::{FieldRegistry, Registered};
pub use value::Value;

use crate::{
    Doc,
    id::{DocId, FieldId},
};

/// Callback bound into an ObjectField by its owner; invoked with every diff.
pub type UpdateHook = Arc<dyn Fn(ListDiff) + Send + Sync>;

/// Where an ObjectField currently lives.
///
/// This is a lookup key, not a pointer: the owner is named by id and position
/// so that clones and serialization never traverse back up the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Stored directly under `key` of a document.
    Doc { doc: DocId, key: String },
    /// Stored in slot `index` of another list.
    List { list: FieldId, index: usize },
}

/// An owned composite field.
///
/// An ObjectField has at most one owner at a time. The owner binds an
/// [`UpdateHook`] on insertion and clears it on removal or replacement.
pub trait ObjectField: Registered {
    /// Identity of this instance.
    fn field_id(&self) -> FieldId;

    /// The container currently owning this field, if any.
    fn owner(&self) -> Option<&Owner>;

    /// Records a new owner and routes future diffs to `hook`.
    fn attach(&mut self, owner: Owner, hook: UpdateHook);

    /// Clears the owner and the bound hook.
    fn detach(&mut self);

    /// Deep copy sharing no nested ObjectField instance with `self`.
    ///
    /// The copy is unowned.
    fn copy(&self) -> Self
    where
        Self: Sized;
}

/// Stored form of a field.
#[derive(Debug, Clone)]
pub enum Slot {
    Value(Value),
    List(List),
    Proxy(ProxyField),
}

impl Slot {
    pub fn type_name(&self) -> &'static str {
        match self {
            Slot::Value(v) => v.type_name(),
            Slot::List(_) => List::type_id(),
            Slot::Proxy(_) => ProxyField::type_id(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Slot::Proxy(_))
    }

    /// The referenced document id, for placeholder slots.
    pub fn reference_id(&self) -> Option<&DocId> {
        match self {
            Slot::Proxy(p) => Some(p.id()),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Slot::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyField> {
        match self {
            Slot::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Deep copy: nested lists get new identities, placeholders get fresh state.
    pub fn copy(&self) -> Slot {
        match self {
            Slot::Value(v) => Slot::Value(v.clone()),
            Slot::List(l) => Slot::List(l.copy()),
            Slot::Proxy(p) => Slot::Proxy(p.copy()),
        }
    }

    /// The resolved view of this slot.
    ///
    /// Placeholders without a cached document appear as [`Field::Dangling`];
    /// callers resolve first when they need the document itself.
    pub fn to_field(&self) -> Field {
        match self {
            Slot::Value(v) => Field::Value(v.clone()),
            Slot::List(l) => Field::List(l.clone()),
            Slot::Proxy(p) => match p.cached() {
                Some(doc) => Field::Doc(doc),
                None => Field::Dangling(p.id().clone()),
            },
        }
    }

    /// Owned variant of [`Slot::to_field`].
    pub fn into_field(self) -> Field {
        match self {
            Slot::Value(v) => Field::Value(v),
            Slot::List(l) => Field::List(l),
            proxy @ Slot::Proxy(_) => proxy.to_field(),
        }
    }

    /// Compares against a non-reference needle without resolving anything.
    ///
    /// Lists match by instance, not by contents.
    pub(crate) fn matches(&self, needle: &Field) -> bool {
        match (self, needle) {
            (Slot::Value(v), Field::Value(p)) => v == p,
            (Slot::List(l), Field::List(p)) => l.field_id() == p.field_id(),
            _ => false,
        }
    }

    /// See [`List`] on snapshots stored back into a container.
    pub(crate) fn claim(self) -> Slot {
        match self {
            Slot::List(list) => Slot::List(list.claim()),
            other => other,
        }
    }

    pub(crate) fn detach(&mut self) {
        if let Slot::List(list) = self {
            list.detach();
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Slot::Value(a), Slot::Value(b)) => a == b,
            (Slot::List(a), Slot::List(b)) => a == b,
            (Slot::Proxy(a), Slot::Proxy(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

impl From<List> for Slot {
    fn from(list: List) -> Self {
        Slot::List(list)
    }
}

impl From<ProxyField> for Slot {
    fn from(proxy: ProxyField) -> Self {
        Slot::Proxy(proxy)
    }
}

/// Resolved form of a field.
#[derive(Debug, Clone)]
pub enum Field {
    Value(Value),
    List(List),
    /// A resolved document reference.
    Doc(Doc),
    /// A reference whose target could not be found.
    Dangling(DocId),
}

impl Field {
    pub fn type_name(&self) -> &'static str {
        match self {
            Field::Value(v) => v.type_name(),
            Field::List(_) => List::type_id(),
            Field::Doc(_) => "doc",
            Field::Dangling(_) => "dangling",
        }
    }

    /// True for document references, resolved or not.
    pub fn is_reference(&self) -> bool {
        matches!(self, Field::Doc(_) | Field::Dangling(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_text)
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_int)
    }

    pub fn as_number(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_number)
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Field::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_doc(&self) -> Option<&Doc> {
        match self {
            Field::Doc(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_doc(self) -> Option<Doc> {
        match self {
            Field::Doc(d) => Some(d),
            _ => None,
        }
    }

    /// Converts to stored form; documents become resolved placeholders.
    pub fn into_slot(self) -> Slot {
        match self {
            Field::Value(v) => Slot::Value(v),
            Field::List(l) => Slot::List(l),
            Field::Doc(d) => Slot::Proxy(ProxyField::resolved(&d)),
            Field::Dangling(id) => Slot::Proxy(ProxyField::new(id)),
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Value(a), Field::Value(b)) => a == b,
            (Field::List(a), Field::List(b)) => a == b,
            (Field::Doc(a), Field::Doc(b)) => a == b,
            (Field::Dangling(a), Field::Dangling(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<List> for Field {
    fn from(list: List) -> Self {
        Field::List(list)
    }
}

impl From<Doc> for Field {
    fn from(doc: Doc) -> Self {
        Field::Doc(doc)
    }
}

impl From<&Doc> for Field {
    fn from(doc: &Doc) -> Self {
        Field::Doc(doc.clone())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Value(value.into())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Value(value.into())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Value(value.into())
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Value(value.into())
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Value(value.into())
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Value(value.into())
    }
}

impl From<DateTime<Utc>> for Field {
    fn from(value: DateTime<Utc>) -> Self {
        Field::Value(value.into())
    }
}
