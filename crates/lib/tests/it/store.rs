use std::{sync::Arc, time::Duration};

use docbranch::{
    DocId, DocSnapshot, Field, InMemoryRemote, List, ObjectField, Store, StoreConfig,
    doc::{AUTHOR, last_modified_key},
    field::Owner,
};
use serde_json::json;

use crate::helpers::{at, clocked_store, proxy, store_over, tagged_list, test_store};

#[tokio::test]
async fn unknown_documents_resolve_to_none() {
    let (store, remote) = test_store();
    let id = DocId::new("ghost");
    assert!(store.get_doc(&id).await.unwrap().is_none());
    let err = store.require_doc(&id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(remote.fetch_count(), 2);
}

#[tokio::test]
async fn fetched_documents_are_cached_canonically() {
    let remote = Arc::new(InMemoryRemote::with_docs([
        DocSnapshot::new("a").with_field("title", json!("A")),
    ]));
    let (store, remote) = store_over(remote);

    let first = store.require_doc(&"a".into()).await.unwrap();
    let second = store.require_doc(&"a".into()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(remote.fetch_count(), 1);
    assert_eq!(store.cached(&"a".into()), Some(first));
}

#[tokio::test]
async fn concurrent_single_reads_coalesce() {
    let remote = Arc::new(InMemoryRemote::with_docs([DocSnapshot::new("a")]));
    remote.set_latency(Some(Duration::from_millis(20)));
    let (store, remote) = store_over(remote);
    let id = DocId::new("a");

    let (x, y, z) = tokio::join!(store.get_doc(&id), store.get_doc(&id), store.get_doc(&id));
    let x = x.unwrap().unwrap();
    assert_eq!(Some(x.clone()), y.unwrap());
    assert_eq!(Some(x), z.unwrap());
    assert_eq!(remote.fetch_count(), 1);
}

#[tokio::test]
async fn failed_batches_fail_every_waiter() {
    let remote = Arc::new(InMemoryRemote::with_docs([DocSnapshot::new("a")]));
    remote.set_latency(Some(Duration::from_millis(20)));
    remote.set_failure(Some("connection reset"));
    let (store, remote) = store_over(remote);
    let id = DocId::new("a");

    let (x, y) = tokio::join!(store.get_doc(&id), store.get_doc(&id));
    assert!(x.unwrap_err().is_resolution_failure());
    assert!(y.unwrap_err().is_resolution_failure());
    assert_eq!(remote.fetch_count(), 1);

    // Nothing stale is left behind.
    remote.set_failure(None);
    assert!(store.get_doc(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn snapshots_materialize_with_ownership_rewired() {
    let (store, _remote) = test_store();
    let linked = store.create_doc();
    let doc = store.create_doc();
    let mut items = List::from(vec!["a"]);
    items.push(List::from(vec![1, 2]));
    items.push(&linked);
    doc.set("items", items);
    doc.set_stamped("title", "hello", at(1_000));
    doc.set("link", &linked);

    let remote = Arc::new(InMemoryRemote::with_docs([doc.snapshot(), linked.snapshot()]));
    let (fresh, _) = store_over(remote);
    let copy = fresh.require_doc(doc.id()).await.unwrap();

    assert_eq!(copy.get_text("title").as_deref(), Some("hello"));
    assert_eq!(copy.last_modified("title"), Some(at(1_000)));
    assert_eq!(copy.reference("link").unwrap().id(), linked.id());

    let items = copy.list_mut("items", |l| l.owner().cloned()).unwrap();
    assert_eq!(
        items,
        Some(Owner::Doc {
            doc: copy.id().clone(),
            key: "items".to_string(),
        })
    );
    let nested = copy
        .list_mut("items", |l| l.get_list_mut(1).and_then(|n| n.owner().cloned()))
        .unwrap();
    assert!(matches!(nested, Some(Owner::List { index: 1, .. })));

    let docs = copy.docs("items", &fresh).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id(), linked.id());
    assert_eq!(copy.snapshot(), doc.snapshot());
}

#[tokio::test]
async fn materialize_refreshes_the_cached_instance() {
    let (store, _remote) = test_store();
    let doc = store.create_doc();
    doc.set("title", "old");
    let holder = store.create_doc();
    holder.set("link", &doc);

    let refreshed = store
        .materialize(DocSnapshot::new(doc.id().clone()).with_field("title", json!("new")))
        .unwrap();
    assert_eq!(refreshed, doc);
    assert_eq!(doc.get_text("title").as_deref(), Some("new"));
    let via_link = holder.get_doc("link", &store).await.unwrap().unwrap();
    assert_eq!(via_link, doc);
}

#[test]
fn malformed_snapshots_are_rejected() {
    let (store, _remote) = test_store();
    let bad = DocSnapshot::new("bad").with_field("x", json!({ "__type": "mystery" }));
    let err = store.materialize(bad).unwrap_err();
    assert!(err.is_store_error());

    let untagged = DocSnapshot::new("untagged").with_field("x", json!([1, 2]));
    assert!(store.materialize(untagged).is_err());
}

#[tokio::test]
async fn fractional_fields_do_not_poison_a_batch() {
    let remote = Arc::new(InMemoryRemote::with_docs([
        DocSnapshot::new("d1")
            .with_field("x", json!(12.5))
            .with_field("size", tagged_list(vec![json!(0.75), json!(2)])),
        DocSnapshot::new("d2"),
    ]));
    let (store, remote) = store_over(remote);

    let docs = store.get_docs(&["d1".into(), "d2".into()]).await.unwrap();
    assert_eq!(docs.len(), 2);
    let d1 = &docs[&DocId::new("d1")];
    assert_eq!(d1.get_number_or("x", 0.0), 12.5);
    assert_eq!(d1.get_int_or("x", -1), -1);
    assert_eq!(d1.get_list("size").unwrap(), List::from_slots(vec![
        Field::from(0.75).into_slot(),
        Field::from(2).into_slot(),
    ]));
    assert_eq!(d1.snapshot(), remote.get(&"d1".into()).unwrap());
}

#[tokio::test]
async fn placeholders_in_a_document_resolve_in_one_batch() {
    let remote = Arc::new(InMemoryRemote::with_docs([
        DocSnapshot::new("root")
            .with_field("link", proxy("a"))
            .with_field("data", tagged_list(vec![proxy("b"), proxy("c"), json!(5)])),
        DocSnapshot::new("a"),
        DocSnapshot::new("b"),
        DocSnapshot::new("c"),
    ]));
    let (store, remote) = store_over(remote);
    let root = store.require_doc(&"root".into()).await.unwrap();
    store.resolve_placeholders(&root).await.unwrap();

    assert_eq!(remote.fetch_count(), 2);
    assert_eq!(remote.fetch_log()[1].len(), 3);
    assert!(matches!(root.field("link"), Some(Field::Doc(_))));
    assert!(root.get_list("data").unwrap().is_resolved());
}

#[test]
fn stamps_come_from_the_store_clock() {
    let (store, clock) = clocked_store();
    let doc = store.create_doc();
    let before = clock.get();
    store.set_stamped(&doc, "data", "content");
    let stamp = doc.get_date(&last_modified_key("data")).unwrap();
    assert_eq!(stamp.timestamp_millis() as u64, before);

    let later = store.stamp(&doc, "data");
    assert!(later > stamp);
}

#[test]
fn configuration_shapes_new_documents() {
    let config = StoreConfig {
        default_layout_key: "text".to_string(),
        current_user: Some("ada".to_string()),
        ..Default::default()
    };
    let store = Store::with_config(Arc::new(InMemoryRemote::new()), config);
    let doc = store.create_doc();
    assert_eq!(doc.get_text(AUTHOR).as_deref(), Some("ada"));
    assert_eq!(store.layout_key(&doc), "text");
    doc.set("layoutKey", "body");
    assert_eq!(store.layout_key(&doc), "body");
}

#[tokio::test]
async fn remote_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docs.json");

    let missing = InMemoryRemote::load_from_file(&path).await.unwrap();
    assert!(missing.is_empty());

    let (store, remote) = test_store();
    let parent = store.create_doc();
    let child = store.create_doc();
    parent.add_child("data", &child).unwrap();
    for snapshot in store.snapshots() {
        remote.put(snapshot);
    }
    remote.save_to_file(&path).await.unwrap();

    let loaded = Arc::new(InMemoryRemote::load_from_file(&path).await.unwrap());
    assert_eq!(loaded.len(), 2);
    let (fresh, _) = store_over(loaded);
    let reloaded = fresh.require_doc(parent.id()).await.unwrap();
    let kids = reloaded.docs("data", &fresh).await.unwrap();
    assert_eq!(kids.len(), 1);
    assert_eq!(kids[0].reference("context").unwrap().id(), parent.id());
}

#[tokio::test]
async fn unsupported_file_versions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docs.json");
    tokio::fs::write(&path, r#"{"_v": 7, "docs": []}"#).await.unwrap();
    let err = InMemoryRemote::load_from_file(&path).await.unwrap_err();
    assert!(err.is_store_error());
}
