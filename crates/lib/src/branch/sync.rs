//! Field-level last-writer-wins synchronization.

use tracing::debug;

use crate::{
    doc::{Doc, last_modified_key},
    store::Store,
};

/// Copies `src`'s layout field onto `dest` if `src` is strictly newer.
///
/// Only the field named by `src`'s layout key is considered, compared through
/// its `-lastModified` companion. A missing stamp is older than any stamp, so
/// an unstamped source never overwrites. When copying, the value is deep
/// copied and the timestamp travels with it. Returns whether `dest` changed.
pub fn sync_docs(store: &Store, dest: &Doc, src: &Doc) -> bool {
    let key = store.layout_key(src);
    let stamp_key = last_modified_key(&key);
    let dest_stamp = dest.get_date(&stamp_key);
    let src_stamp = src.get_date(&stamp_key);
    let Some(src_stamp) = src_stamp.filter(|s| Some(*s) > dest_stamp) else {
        return false;
    };

    match src.slot(&key) {
        Some(slot) => dest.set_slot(&key, slot.copy()),
        None => {
            dest.unset(&key);
        }
    }
    dest.set(&stamp_key, src_stamp);
    debug!(dest = %dest.id(), src = %src.id(), key = %key, "synced field");
    true
}
