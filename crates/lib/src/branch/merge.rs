//! Merge: every branch into master.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{BranchReport, clone::clone_doc, resolve_origins, sync::sync_docs};
use crate::{
    Result,
    doc::{BRANCH_OF, BRANCHES, CONTEXT, Doc, ListInsert},
    field::List,
    id::DocId,
    store::Store,
};

/// Folds the collection `<layoutKey><suffix>` of every registered branch back
/// into `master`.
///
/// For each branch child, the master counterpart is its `branchOf` target. A
/// child with no counterpart is cloned and promoted: the clone becomes the
/// canonical master document and the branch child becomes its branch. The
/// counterpart is then added to master (a no-op if present) and synchronized
/// branch to master.
///
/// Finally every master child with no counterpart in any branch is removed
/// from master and loses its `context`. This assumes every branch has pulled
/// since master last changed; a stale branch makes new master children look
/// deleted. Nothing enforces that assumption.
pub(crate) async fn merge_with_master(
    store: &Store,
    master: &Doc,
    suffix: &str,
) -> Result<BranchReport> {
    let mut report = BranchReport::default();
    let branches = master.docs(BRANCHES, store).await?;
    if branches.is_empty() {
        debug!(master = %master.id(), "no branches to merge");
        return Ok(report);
    }
    let master_key = format!("{}{suffix}", store.layout_key(master));
    let mut kept: HashSet<DocId> = HashSet::new();

    for branch in &branches {
        let branch_key = format!("{}{suffix}", store.layout_key(branch));
        let branch_children = branch.docs(&branch_key, store).await?;
        let origins = resolve_origins(store, &branch_children).await?;

        for (bd, origin) in branch_children.iter().zip(origins) {
            let master_child = match origin {
                Some(origin) => origin,
                None => {
                    let cloned = clone_doc(store, bd, true).await?;
                    for (branch_doc, promoted) in &cloned.pairs {
                        promote(branch_doc, promoted)?;
                        report.promoted += 1;
                    }
                    cloned.clone
                }
            };
            master.add_doc_to_list(&master_key, &master_child, ListInsert::Back)?;
            master_child.set(CONTEXT, master);
            if sync_docs(store, &master_child, bd) {
                report.synced += 1;
            }
            kept.insert(master_child.id().clone());
        }
    }

    for mc in master.docs(&master_key, store).await? {
        if kept.contains(mc.id()) {
            continue;
        }
        if master.remove_doc_from_list(&master_key, &mc)? {
            warn!(
                master_doc = %mc.id(),
                "removing master document absent from every branch"
            );
            mc.unset(CONTEXT);
            report.removed += 1;
        }
    }

    info!(
        master = %master.id(),
        key = %master_key,
        branches = branches.len(),
        synced = report.synced,
        promoted = report.promoted,
        removed = report.removed,
        "merged branches"
    );
    Ok(report)
}

/// Swaps roles after branch-cloning `branch_doc` into `promoted`: the clone
/// becomes the origin and `branch_doc` its only branch.
fn promote(branch_doc: &Doc, promoted: &Doc) -> Result<()> {
    promoted.unset(BRANCH_OF);
    promoted.set(BRANCHES, List::from(vec![branch_doc]));
    branch_doc.remove_doc_from_list(BRANCHES, promoted)?;
    branch_doc.set(BRANCH_OF, promoted);
    debug!(branch_doc = %branch_doc.id(), master_doc = %promoted.id(), "promoted document");
    Ok(())
}
