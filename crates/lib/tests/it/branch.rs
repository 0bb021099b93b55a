use docbranch::{
    BranchAction, Doc, Store, create_branch,
    doc::{BRANCH_OF, BRANCHES, CLONE_OF, CONTEXT, last_modified_key},
    run_branch_task,
};

use crate::helpers::{at, store_over, test_store};

/// A master with an empty `data` collection and one branch of it.
async fn master_and_branch(store: &Store) -> (Doc, Doc) {
    let master = store.create_doc();
    let branch = create_branch(store, &master).await.unwrap();
    (master, branch)
}

async fn child_of(store: &Store, parent: &Doc) -> Doc {
    let child = store.create_doc();
    parent.add_child("data", &child).unwrap();
    child
}

#[tokio::test]
async fn create_branch_links_both_ways() {
    let (store, _remote) = test_store();
    let master = store.create_doc();
    let first = child_of(&store, &master).await;
    master.set("title", "root");

    let branch = create_branch(&store, &master).await.unwrap();
    assert_eq!(branch.branch_of(&store).await.unwrap(), Some(master.clone()));
    assert_eq!(master.docs(BRANCHES, &store).await.unwrap(), vec![branch.clone()]);
    assert_eq!(branch.reference(CLONE_OF).unwrap().id(), master.id());
    assert_eq!(branch.get_text("title").as_deref(), Some("root"));

    // The subtree is branched as a whole.
    let copies = branch.docs("data", &store).await.unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].branch_of(&store).await.unwrap(), Some(first));
    assert_eq!(copies[0].reference(CONTEXT).unwrap().id(), branch.id());
}

#[tokio::test]
async fn pull_clones_new_master_children() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;

    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(report.cloned, 1);

    let kids = branch.docs("data", &store).await.unwrap();
    assert_eq!(kids.len(), 1);
    let d1_copy = &kids[0];
    assert_ne!(d1_copy, &d1);
    assert_eq!(d1_copy.branch_of(&store).await.unwrap(), Some(d1.clone()));
    assert_eq!(d1_copy.reference(CONTEXT).unwrap().id(), branch.id());
    assert!(d1.docs(BRANCHES, &store).await.unwrap().contains(d1_copy));
}

#[tokio::test]
async fn pull_keeps_newer_branch_edits() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    let d1_copy = branch.docs("data", &store).await.unwrap().remove(0);

    d1.set_stamped("data", "master text", at(3));
    d1_copy.set_stamped("data", "branch text", at(5));
    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();

    assert_eq!(report.synced, 0);
    assert_eq!(d1_copy.get_text("data").as_deref(), Some("branch text"));
    assert_eq!(d1_copy.last_modified("data"), Some(at(5)));
}

#[tokio::test]
async fn pull_copies_newer_master_content() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    let d1_copy = branch.docs("data", &store).await.unwrap().remove(0);

    d1_copy.set_stamped("data", "branch text", at(5));
    d1.set_stamped("data", "master text", at(10));
    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(d1_copy.get_text("data").as_deref(), Some("master text"));
    assert_eq!(
        d1_copy.get_date(&last_modified_key("data")),
        Some(at(10))
    );
}

#[tokio::test]
async fn pull_is_idempotent() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    child_of(&store, &master).await;
    child_of(&store, &master).await;

    let first = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(first.cloned, 2);

    let second = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(second.cloned, 0);
    assert_eq!(second.removed, 0);
    assert_eq!(branch.docs("data", &store).await.unwrap().len(), 2);
}

#[tokio::test]
async fn merge_removes_children_deleted_on_every_branch() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    let d1_copy = branch.docs("data", &store).await.unwrap().remove(0);

    branch.remove_child("data", &d1_copy).unwrap();
    assert!(!d1_copy.has(CONTEXT));

    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert!(master.docs("data", &store).await.unwrap().is_empty());
    assert!(!d1.has(CONTEXT));
}

#[tokio::test]
async fn merge_keeps_children_held_by_any_branch() {
    let (store, _remote) = test_store();
    let (master, left) = master_and_branch(&store).await;
    let right = create_branch(&store, &master).await.unwrap();
    let d1 = child_of(&store, &master).await;
    for branch in [&left, &right] {
        run_branch_task(&store, branch, BranchAction::Pull)
            .await
            .unwrap();
    }

    let left_copy = left.docs("data", &store).await.unwrap().remove(0);
    left.remove_child("data", &left_copy).unwrap();
    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(master.docs("data", &store).await.unwrap(), vec![d1.clone()]);

    let right_copy = right.docs("data", &store).await.unwrap().remove(0);
    right.remove_child("data", &right_copy).unwrap();
    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert!(!d1.has(CONTEXT));
}

#[tokio::test]
async fn pull_removes_documents_whose_origin_was_deleted() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();

    master.remove_child("data", &d1).unwrap();
    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert!(branch.docs("data", &store).await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_promotes_branch_only_children() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let c = child_of(&store, &branch).await;
    c.set_stamped("data", "written on the branch", at(7));

    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(report.promoted, 1);

    let promoted = master.docs("data", &store).await.unwrap();
    assert_eq!(promoted.len(), 1);
    let promoted = &promoted[0];
    assert_ne!(promoted, &c);
    assert!(!promoted.has(BRANCH_OF));
    assert!(promoted.docs(BRANCHES, &store).await.unwrap().contains(&c));
    assert_eq!(promoted.reference(CONTEXT).unwrap().id(), master.id());
    assert_eq!(
        promoted.get_text("data").as_deref(),
        Some("written on the branch")
    );

    // The branch child now points at its promoted master copy.
    assert_eq!(c.branch_of(&store).await.unwrap().as_ref(), Some(promoted));
    assert!(!c.docs(BRANCHES, &store).await.unwrap().contains(promoted));

    // A second merge finds the counterpart and promotes nothing.
    let again = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(again.promoted, 0);
    assert_eq!(master.docs("data", &store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_syncs_newer_branch_content() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    d1.set_stamped("data", "v1", at(1));
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    let d1_copy = branch.docs("data", &store).await.unwrap().remove(0);

    d1_copy.set_stamped("data", "v2", at(2));
    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(d1.get_text("data").as_deref(), Some("v2"));
}

#[tokio::test]
async fn merge_without_branches_changes_nothing() {
    let (store, _remote) = test_store();
    let master = store.create_doc();
    child_of(&store, &master).await;
    let report = run_branch_task(&store, &master, BranchAction::Merge)
        .await
        .unwrap();
    assert!(report.is_empty());
    assert_eq!(master.docs("data", &store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tasks_visit_annotation_collections_one_level_down() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    let d1 = child_of(&store, &master).await;
    let note = store.create_doc();
    d1.add_child("data-annotations", &note).unwrap();
    let deep = store.create_doc();
    note.add_child("data-annotations", &deep).unwrap();

    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    let d1_copy = branch.docs("data", &store).await.unwrap().remove(0);
    let notes = d1_copy.docs("data-annotations", &store).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].branch_of(&store).await.unwrap(), Some(note.clone()));

    // New annotations on master children are pulled; annotations on
    // annotations are not visited.
    let second = store.create_doc();
    d1.add_child("data-annotations", &second).unwrap();
    let deeper = store.create_doc();
    deep.add_child("data-annotations", &deeper).unwrap();
    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(report.cloned, 1);
    assert_eq!(d1_copy.docs("data-annotations", &store).await.unwrap().len(), 2);
}

#[tokio::test]
async fn layout_key_selects_the_collection() {
    let (store, _remote) = test_store();
    let master = store.create_doc();
    master.set("layoutKey", "pages");
    let branch = create_branch(&store, &master).await.unwrap();
    let page = store.create_doc();
    master.add_child("pages", &page).unwrap();
    let ignored = store.create_doc();
    master.add_child("data", &ignored).unwrap();

    let report = run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    assert_eq!(report.cloned, 1);
    assert_eq!(branch.docs("pages", &store).await.unwrap().len(), 1);
    assert!(branch.docs("data", &store).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_tasks_on_one_target_do_not_duplicate() {
    let (store, _remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    child_of(&store, &master).await;
    child_of(&store, &master).await;

    let (a, b) = tokio::join!(
        run_branch_task(&store, &branch, BranchAction::Pull),
        run_branch_task(&store, &branch, BranchAction::Pull),
    );
    assert_eq!(a.unwrap().cloned + b.unwrap().cloned, 2);
    assert_eq!(branch.docs("data", &store).await.unwrap().len(), 2);
}

#[tokio::test]
async fn pull_resolves_a_persisted_branch_lazily() {
    let (store, remote) = test_store();
    let (master, branch) = master_and_branch(&store).await;
    child_of(&store, &master).await;
    run_branch_task(&store, &branch, BranchAction::Pull)
        .await
        .unwrap();
    child_of(&store, &master).await;
    for snapshot in store.snapshots() {
        remote.put(snapshot);
    }

    let (fresh, fresh_remote) = store_over(remote.clone());
    assert_eq!(fresh_remote.fetch_count(), 0);
    let branch = fresh.require_doc(branch.id()).await.unwrap();
    let report = run_branch_task(&fresh, &branch, BranchAction::Pull)
        .await
        .unwrap();

    assert_eq!(report.cloned, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(branch.docs("data", &fresh).await.unwrap().len(), 2);
    assert!(fresh_remote.fetch_count() > 1);
}
