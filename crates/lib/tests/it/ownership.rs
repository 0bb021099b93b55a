use docbranch::{
    Field, List, ObjectField,
    field::{Owner, Slot},
};

use crate::helpers::test_store;

fn owner_at(doc: &docbranch::Doc, key: &str) -> Option<Owner> {
    doc.list_mut(key, |list| list.owner().cloned()).unwrap()
}

#[test]
fn assigned_list_is_owned_by_its_key() {
    let (store, _remote) = test_store();
    let doc = store.create_doc();
    let list = List::from(vec!["a"]);
    let id = list.field_id();
    assert!(list.owner().is_none());

    doc.set("tags", list);
    assert_eq!(
        owner_at(&doc, "tags"),
        Some(Owner::Doc {
            doc: doc.id().clone(),
            key: "tags".to_string(),
        })
    );
    assert_eq!(doc.get_list("tags").unwrap().field_id(), id);
}

#[test]
fn moving_a_list_clears_the_previous_owner() {
    let (store, _remote) = test_store();
    let a = store.create_doc();
    let b = store.create_doc();
    a.set("items", List::from(vec![1, 2]));
    let mut a_updates = a.subscribe();

    let moved = a.take_list("items").unwrap();
    assert!(moved.owner().is_none());
    assert!(!a.has("items"));
    // The removal itself is the last thing `a` hears about.
    assert!(a_updates.try_recv().is_ok());

    b.set("items", moved);
    b.list_mut("items", |list| list.push(3)).unwrap();
    assert!(a_updates.try_recv().is_err());
    assert_eq!(
        owner_at(&b, "items"),
        Some(Owner::Doc {
            doc: b.id().clone(),
            key: "items".to_string(),
        })
    );
}

#[test]
fn replaced_and_unset_lists_stop_reporting() {
    let (store, _remote) = test_store();
    let doc = store.create_doc();
    doc.set("items", List::from(vec![1]));
    doc.set("items", List::from(vec![2]));
    assert_eq!(doc.get_list("items").unwrap(), List::from(vec![2]));

    let mut updates = doc.subscribe();
    let mut removed = match doc.unset("items") {
        Some(Slot::List(list)) => list,
        other => panic!("expected list, got {other:?}"),
    };
    assert!(removed.owner().is_none());
    assert!(updates.try_recv().is_ok());

    removed.push(3);
    assert!(updates.try_recv().is_err());
}

#[test]
fn nested_lists_track_their_index() {
    let (store, _remote) = test_store();
    let doc = store.create_doc();
    let mut outer = List::new();
    outer.push("head");
    outer.push(List::from(vec!["x"]));
    doc.set("outer", outer);

    let outer_id = doc.get_list("outer").unwrap().field_id();
    let nested_owner = |doc: &docbranch::Doc, index| {
        doc.list_mut("outer", |list| {
            list.get_list_mut(index).and_then(|l| l.owner().cloned())
        })
        .unwrap()
    };
    assert_eq!(
        nested_owner(&doc, 1),
        Some(Owner::List {
            list: outer_id,
            index: 1
        })
    );

    doc.list_mut("outer", |list| list.shift()).unwrap();
    assert_eq!(
        nested_owner(&doc, 0),
        Some(Owner::List {
            list: outer_id,
            index: 0
        })
    );
}

#[test]
fn moving_between_lists_transfers_ownership() {
    let mut from = List::new();
    let mut to = List::new();
    from.push(List::from(vec!["child"]));

    let moved = from.remove(0).unwrap();
    let moved = match moved {
        Field::List(list) => list,
        other => panic!("expected list, got {other:?}"),
    };
    assert!(moved.owner().is_none());

    let moved_id = moved.field_id();
    to.push("first");
    to.push(moved);
    let owner = to.get_list_mut(1).and_then(|l| l.owner().cloned());
    assert_eq!(
        owner,
        Some(Owner::List {
            list: to.field_id(),
            index: 1
        })
    );
    assert_eq!(to.get_list_mut(1).unwrap().field_id(), moved_id);
    assert!(from.is_empty());
}

#[test]
fn copies_share_no_nested_instances() {
    let mut original = List::new();
    original.push(List::from(vec![1, 2]));
    original.push("tail");

    let mut copy = original.copy();
    assert_ne!(copy.field_id(), original.field_id());
    assert_eq!(copy, original);

    let inner_original = original.get_list_mut(0).unwrap().field_id();
    let inner_copy = copy.get_list_mut(0).unwrap();
    assert_ne!(inner_copy.field_id(), inner_original);

    inner_copy.push(3);
    assert_eq!(original.get_list_mut(0).unwrap().len(), 2);
    assert_ne!(copy, original);
}

#[test]
fn same_reference_assignment_is_a_no_op() {
    let (store, _remote) = test_store();
    let doc = store.create_doc();
    let target = store.create_doc();
    doc.set("link", &target);

    let mut updates = doc.subscribe();
    doc.set("link", &target);
    doc.set("title", "same");
    doc.set("title", "same");
    let first = updates.try_recv().unwrap();
    assert_eq!(first.key, "title");
    assert!(updates.try_recv().is_err());
}

#[test]
fn stored_snapshots_take_a_new_identity() {
    let (store, _remote) = test_store();
    let a = store.create_doc();
    let b = store.create_doc();
    let mut nested = List::from(vec![1]);
    nested.push(List::from(vec!["inner"]));
    a.set("data", nested);

    let snapshot = a.get_list("data").unwrap();
    assert_eq!(snapshot.field_id(), a.get_list("data").unwrap().field_id());
    b.set("data", snapshot);

    let in_a = a.get_list("data").unwrap();
    let in_b = b.get_list("data").unwrap();
    assert_eq!(in_a, in_b);
    assert_ne!(in_a.field_id(), in_b.field_id());
    let inner_id = |doc: &docbranch::Doc| {
        doc.list_mut("data", |l| l.get_list_mut(1).unwrap().field_id())
            .unwrap()
    };
    assert_ne!(inner_id(&a), inner_id(&b));
    assert_eq!(
        b.list_mut("data", |l| l.get_list_mut(1).and_then(|n| n.owner().cloned()))
            .unwrap(),
        Some(Owner::List {
            list: in_b.field_id(),
            index: 1
        })
    );

    // Pushing a snapshot into another list behaves the same way.
    let mut other = List::new();
    other.push(a.get_list("data").unwrap());
    let pushed = other.get_list_mut(0).unwrap().field_id();
    assert_ne!(pushed, in_a.field_id());

    // A list moved out keeps its identity.
    let moved = a.take_list("data").unwrap();
    let moved_id = moved.field_id();
    b.set("moved", moved);
    assert_eq!(b.get_list("moved").unwrap().field_id(), moved_id);
}
