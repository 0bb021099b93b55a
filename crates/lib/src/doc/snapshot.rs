//! Serialized form of a document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::DocId;

/// A document id plus its fields in tagged JSON form.
///
/// This is the unit exchanged with a [`RemoteResolver`](crate::store::RemoteResolver);
/// [`Store::materialize`](crate::Store::materialize) turns it back into a
/// live [`Doc`](crate::Doc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnapshot {
    pub id: DocId,
    #[serde(default)]
    pub fields: BTreeMap<String, JsonValue>,
}

impl DocSnapshot {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
