//! Pull: master into one branch.

use tracing::{debug, info};

use super::{BranchReport, clone::clone_doc, resolve_origins, sync::sync_docs};
use crate::{
    Result,
    doc::{CONTEXT, Doc, ListInsert},
    store::Store,
};

/// Reconciles the collection `<layoutKey><suffix>` of `branch` against its
/// master (`branchOf`).
///
/// * Master children already present on the branch (matched through their
///   branch counterpart's `branchOf`) are synchronized master to branch.
/// * Master children with no counterpart are branch-cloned and appended,
///   with `context` pointing at the branch.
/// * Branch children whose origin has lost its `context` were deleted on
///   master and are removed from the branch.
///
/// A branch without a resolvable master only runs the removal step.
pub(crate) async fn pull_from_master(
    store: &Store,
    branch: &Doc,
    suffix: &str,
) -> Result<BranchReport> {
    let mut report = BranchReport::default();
    let branch_key = format!("{}{suffix}", store.layout_key(branch));
    let master = branch.branch_of(store).await?;
    let branch_docs = branch.docs(&branch_key, store).await?;
    let origins = resolve_origins(store, &branch_docs).await?;

    if let Some(master) = &master {
        let master_key = format!("{}{suffix}", store.layout_key(master));
        let master_docs = master.docs(&master_key, store).await?;

        let mut new_docs = Vec::new();
        for md in &master_docs {
            let counterpart = branch_docs
                .iter()
                .zip(&origins)
                .find(|(bd, origin)| origin.as_ref().unwrap_or(*bd) == md);
            match counterpart {
                Some((bd, _)) => {
                    if sync_docs(store, bd, md) {
                        report.synced += 1;
                    }
                }
                None => new_docs.push(md),
            }
        }

        for md in new_docs {
            let clone = clone_doc(store, md, true).await?.clone;
            branch.add_doc_to_list(&branch_key, &clone, ListInsert::Back)?;
            clone.set(CONTEXT, branch);
            debug!(master_doc = %md.id(), branch_doc = %clone.id(), "pulled new document");
            report.cloned += 1;
        }
    } else {
        debug!(branch = %branch.id(), "no master to pull from");
    }

    for (bd, origin) in branch_docs.iter().zip(&origins) {
        let Some(origin) = origin else {
            continue;
        };
        if !origin.has(CONTEXT) && branch.remove_doc_from_list(&branch_key, bd)? {
            debug!(branch_doc = %bd.id(), origin = %origin.id(), "removed document deleted on master");
            report.removed += 1;
        }
    }

    info!(
        branch = %branch.id(),
        key = %branch_key,
        synced = report.synced,
        cloned = report.cloned,
        removed = report.removed,
        "pulled from master"
    );
    Ok(report)
}
