//! Change events published by documents.

use serde_json::{Value as JsonValue, json};

use crate::{
    field::{ListDiff, Slot, registry::encode_slot},
    id::DocId,
};

/// What happened to a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// The field was assigned; carries a copy of the new value.
    Set(Slot),
    /// The field was removed.
    Unset,
    /// The list stored in the field changed in place.
    List(ListDiff),
}

/// A single field change on a document, delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct DocUpdate {
    pub doc: DocId,
    pub key: String,
    pub change: FieldChange,
}

impl DocUpdate {
    /// Incremental persistence patch for this change.
    ///
    /// ```
    /// use docbranch::doc::{DocUpdate, FieldChange};
    /// use serde_json::json;
    ///
    /// let update = DocUpdate {
    ///     doc: "d1".into(),
    ///     key: "title".to_string(),
    ///     change: FieldChange::Unset,
    /// };
    /// assert_eq!(update.to_patch(), json!({"$unset": {"fields.title": ""}}));
    /// ```
    pub fn to_patch(&self) -> JsonValue {
        let path = format!("fields.{}", self.key);
        match &self.change {
            FieldChange::Set(slot) => json!({ "$set": { path: encode_slot(slot) } }),
            FieldChange::Unset => json!({ "$unset": { path: "" } }),
            FieldChange::List(diff) => diff.to_patch(&path),
        }
    }
}
