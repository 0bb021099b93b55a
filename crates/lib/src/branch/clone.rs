//! Deep document cloning.

use std::collections::HashMap;

use tracing::debug;

use super::BoxFuture;
use crate::{
    Result,
    doc::{BRANCH_OF, BRANCHES, CLONE_OF, CONTEXT, Doc, ListInsert},
    field::{List, ProxyField, Slot},
    id::DocId,
    store::Store,
};

/// Result of [`clone_doc`].
#[derive(Debug, Clone)]
pub struct Cloned {
    /// Clone of the requested document.
    pub clone: Doc,
    /// Every `(original, clone)` pair produced, root first.
    pub pairs: Vec<(Doc, Doc)>,
}

/// Deep-clones `doc` and every document reachable through its document lists.
///
/// Keys listed in [`StoreConfig::clone_exclusions`](crate::StoreConfig) are
/// skipped. References stored outside lists are shared rather than cloned, and
/// a document reached twice is cloned once. Each clone records `cloneOf`; with
/// `as_branch` it is also wired as a branch of its original (`branchOf` on the
/// clone, the clone appended to the original's `branches`).
pub async fn clone_doc(store: &Store, doc: &Doc, as_branch: bool) -> Result<Cloned> {
    let mut map = HashMap::new();
    let mut pairs = Vec::new();
    let clone = clone_into(store, doc, as_branch, &mut map, &mut pairs).await?;
    debug!(source = %doc.id(), clone = %clone.id(), count = pairs.len(), as_branch, "cloned document");
    Ok(Cloned { clone, pairs })
}

fn clone_into<'a>(
    store: &'a Store,
    doc: &'a Doc,
    as_branch: bool,
    map: &'a mut HashMap<DocId, Doc>,
    pairs: &'a mut Vec<(Doc, Doc)>,
) -> BoxFuture<'a, Result<Doc>> {
    Box::pin(async move {
        if let Some(copy) = map.get(doc.id()) {
            return Ok(copy.clone());
        }
        let copy = store.create_doc();
        map.insert(doc.id().clone(), copy.clone());
        pairs.push((doc.clone(), copy.clone()));

        for key in doc.keys() {
            if store.config().is_excluded_from_clone(&key) {
                continue;
            }
            let Some(slot) = doc.slot(&key) else {
                continue;
            };
            match slot {
                Slot::List(list) if list.slots().iter().any(Slot::is_reference) => {
                    list.resolve(store).await?;
                    let mut items = Vec::with_capacity(list.len());
                    for item in list.slots() {
                        match item.as_proxy().and_then(|p| p.cached()) {
                            Some(child) => {
                                let child_copy =
                                    clone_into(store, &child, as_branch, map, pairs).await?;
                                if child
                                    .reference(CONTEXT)
                                    .is_some_and(|ctx| ctx.id() == doc.id())
                                {
                                    child_copy.set(CONTEXT, &copy);
                                }
                                items.push(Slot::Proxy(ProxyField::resolved(&child_copy)));
                            }
                            None => items.push(item.copy()),
                        }
                    }
                    copy.set(&key, List::from_slots(items));
                }
                other => copy.set_slot(&key, other.copy()),
            }
        }

        copy.set(CLONE_OF, doc);
        if as_branch {
            copy.set(BRANCH_OF, doc);
            doc.add_doc_to_list(BRANCHES, &copy, ListInsert::Back)?;
        }
        Ok(copy)
    })
}
