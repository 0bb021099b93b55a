//! Git-like branching of document subtrees.
//!
//! A *branch* is a clone of a document linked to its origin (*master*): the
//! clone's `branchOf` points at master and master lists the clone under
//! `branches`. Two tasks keep them in step:
//!
//! * **pull** copies structure and content from master into one branch,
//! * **merge** folds every branch back into master, promoting branch-only
//!   documents to canonical status.
//!
//! Both operate on a document's primary collection (`layoutKey`, see
//! [`Store::layout_key`]) and reconcile content one field at a time through
//! `-lastModified` stamps. [`run_branch_task`] applies a task to a target and
//! then to the annotation collection of each of the target's children. It
//! goes exactly one level deep.
//!
//! ```
//! # use std::sync::Arc;
//! # use docbranch::{Store, store::InMemoryRemote, branch::{self, BranchAction}};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> docbranch::Result<()> {
//! let store = Store::new(Arc::new(InMemoryRemote::new()));
//! let master = store.create_doc();
//! let fork = branch::create_branch(&store, &master).await?;
//!
//! let note = store.create_doc();
//! master.add_child("data", &note)?;
//!
//! let report = branch::run_branch_task(&store, &fork, BranchAction::Pull).await?;
//! assert_eq!(report.cloned, 1);
//! assert_eq!(fork.docs("data", &store).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod clone;
pub mod errors;
mod merge;
mod pull;
pub mod sync;

use std::{fmt, future::Future, pin::Pin, str::FromStr};

use serde::Serialize;
use tracing::{Instrument, info, info_span};

pub use clone::{Cloned, clone_doc};
pub use errors::BranchError;
pub use sync::sync_docs;

use crate::{
    Result,
    doc::{BRANCH_OF, Doc},
    store::Store,
};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A branch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchAction {
    /// Update a branch from its master.
    Pull,
    /// Fold all branches of a master back into it.
    Merge,
}

impl fmt::Display for BranchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchAction::Pull => f.write_str("pull"),
            BranchAction::Merge => f.write_str("merge"),
        }
    }
}

impl FromStr for BranchAction {
    type Err = BranchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pull" => Ok(BranchAction::Pull),
            "merge" => Ok(BranchAction::Merge),
            other => Err(BranchError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

/// Counts of what a task changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BranchReport {
    /// Documents whose layout field was overwritten by a newer counterpart.
    pub synced: usize,
    /// Master documents cloned onto a branch by pull.
    pub cloned: usize,
    /// Branch documents promoted to master by merge.
    pub promoted: usize,
    /// Documents removed from a collection.
    pub removed: usize,
}

impl BranchReport {
    pub fn absorb(&mut self, other: BranchReport) {
        self.synced += other.synced;
        self.cloned += other.cloned;
        self.promoted += other.promoted;
        self.removed += other.removed;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Creates a branch of `target`: a deep clone wired through `branchOf` and
/// `branches`.
pub async fn create_branch(store: &Store, target: &Doc) -> Result<Doc> {
    let cloned = clone_doc(store, target, true).await?;
    info!(origin = %target.id(), branch = %cloned.clone.id(), "created branch");
    Ok(cloned.clone)
}

/// Runs `action` against `target`'s primary collection, then against the
/// annotation collection of each of its direct children.
///
/// Tasks on the same target are serialized: a second call waits until the
/// first finishes. Tasks are not transactional; an error partway leaves
/// whatever was already applied in place.
pub async fn run_branch_task(
    store: &Store,
    target: &Doc,
    action: BranchAction,
) -> Result<BranchReport> {
    let span = info_span!("branch_task", target = %target.id(), action = %action);
    async move {
        let _turn = store.lock_target(target.id()).await;
        info!("starting branch task");

        let mut report = run_action(store, target, action, "").await?;

        let suffix = store.config().annotations_suffix.clone();
        let children = target.docs(&store.layout_key(target), store).await?;
        for child in &children {
            report.absorb(run_action(store, child, action, &suffix).await?);
        }

        info!(
            children = children.len(),
            synced = report.synced,
            cloned = report.cloned,
            promoted = report.promoted,
            removed = report.removed,
            "branch task finished"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

async fn run_action(
    store: &Store,
    target: &Doc,
    action: BranchAction,
    suffix: &str,
) -> Result<BranchReport> {
    match action {
        BranchAction::Pull => pull::pull_from_master(store, target, suffix).await,
        BranchAction::Merge => merge::merge_with_master(store, target, suffix).await,
    }
}

/// The `branchOf` target of each document, resolved with one batched fetch.
///
/// `None` means the document has no origin and is its own master.
pub(crate) async fn resolve_origins(store: &Store, docs: &[Doc]) -> Result<Vec<Option<Doc>>> {
    let proxies: Vec<_> = docs.iter().map(|d| d.reference(BRANCH_OF)).collect();
    let pending: Vec<_> = proxies
        .iter()
        .flatten()
        .filter(|p| p.needs_fetch())
        .map(|p| p.id().clone())
        .collect();
    let fetched = if pending.is_empty() {
        Default::default()
    } else {
        store.get_docs(&pending).await?
    };
    Ok(proxies
        .into_iter()
        .map(|proxy| {
            let proxy = proxy?;
            proxy.cached().or_else(|| {
                let doc = fetched.get(proxy.id())?;
                proxy.set_value(doc);
                Some(doc.clone())
            })
        })
        .collect())
}
