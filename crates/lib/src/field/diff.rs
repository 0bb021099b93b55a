//! Structured change descriptions emitted by [`List`](super::List).
//!
//! Positional mutations report a [`ListDiff::Splice`], whole-container
//! rewrites report a [`ListDiff::Reset`] and changes inside a nested list are
//! wrapped in [`ListDiff::Nested`]. Every diff carries its own copies of the
//! affected slots, so it can be replayed onto a mirror or turned into a
//! persistence patch after the source list has moved on.

use serde_json::{Value as JsonValue, json};

use super::{
    FieldError, List, Slot,
    registry::{Registered, TYPE_TAG, encode_slot},
};

/// A single list change.
#[derive(Debug, Clone, PartialEq)]
pub enum ListDiff {
    /// The container was rewritten; `items` is its full new contents.
    Reset { items: Vec<Slot> },
    /// `removed` was replaced by `added` starting at `index`; `length` is the
    /// resulting container length.
    Splice {
        index: usize,
        removed: Vec<Slot>,
        added: Vec<Slot>,
        length: usize,
    },
    /// The list stored at `index` changed.
    Nested { index: usize, diff: Box<ListDiff> },
}

impl ListDiff {
    /// Resulting length of the list this diff was emitted by, when the diff
    /// changes it.
    pub fn length(&self) -> Option<usize> {
        match self {
            ListDiff::Reset { items } => Some(items.len()),
            ListDiff::Splice { length, .. } => Some(*length),
            ListDiff::Nested { .. } => None,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, ListDiff::Reset { .. })
    }

    /// Replays this diff onto `mirror`, a copy of the pre-change contents.
    pub fn apply(&self, mirror: &mut Vec<Slot>) -> Result<(), FieldError> {
        match self {
            ListDiff::Reset { items } => {
                *mirror = items.iter().map(Slot::copy).collect();
            }
            ListDiff::Splice {
                index,
                removed,
                added,
                ..
            } => {
                let end = index + removed.len();
                if end > mirror.len() {
                    return Err(FieldError::IndexOutOfBounds {
                        index: end,
                        len: mirror.len(),
                    });
                }
                mirror.splice(*index..end, added.iter().map(Slot::copy));
            }
            ListDiff::Nested { index, diff } => {
                let len = mirror.len();
                match mirror.get_mut(*index) {
                    Some(Slot::List(list)) => list.apply(diff)?,
                    Some(other) => {
                        return Err(FieldError::TypeMismatch {
                            key: index.to_string(),
                            expected: "list".to_string(),
                            actual: other.type_name().to_string(),
                        });
                    }
                    None => return Err(FieldError::IndexOutOfBounds { index: *index, len }),
                }
            }
        }
        Ok(())
    }

    /// Converts the diff into an incremental persistence patch for the list
    /// stored at `path`.
    ///
    /// Appends become `$addToSet`, pure removals `$remFromSet`, any other
    /// splice `$splice` and resets a full `$set`.
    pub fn to_patch(&self, path: &str) -> JsonValue {
        match self {
            ListDiff::Reset { items } => json!({
                "$set": { path: { TYPE_TAG: List::type_id(), "fields": encode_items(items) } }
            }),
            ListDiff::Splice {
                index,
                removed,
                added,
                length,
            } => {
                if removed.is_empty() && index + added.len() == *length {
                    json!({
                        "$addToSet": { path: { "items": encode_items(added), "length": length } }
                    })
                } else if added.is_empty() {
                    json!({
                        "$remFromSet": {
                            path: { "index": index, "items": encode_items(removed), "length": length }
                        }
                    })
                } else {
                    json!({
                        "$splice": {
                            path: {
                                "index": index,
                                "deleteCount": removed.len(),
                                "items": encode_items(added),
                                "length": length,
                            }
                        }
                    })
                }
            }
            ListDiff::Nested { index, diff } => diff.to_patch(&format!("{path}.{index}")),
        }
    }
}

fn encode_items(items: &[Slot]) -> JsonValue {
    JsonValue::Array(items.iter().map(encode_slot).collect())
}
