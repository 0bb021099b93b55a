use std::sync::Arc;

use chrono::{DateTime, Utc};
use docbranch::{DocId, DocSnapshot, FixedClock, InMemoryRemote, Store, StoreConfig};
use serde_json::{Value as JsonValue, json};

/// A store over an empty in-memory remote.
pub fn test_store() -> (Store, Arc<InMemoryRemote>) {
    store_over(Arc::new(InMemoryRemote::new()))
}

/// A store over `remote` with default configuration.
pub fn store_over(remote: Arc<InMemoryRemote>) -> (Store, Arc<InMemoryRemote>) {
    let store = Store::new(remote.clone());
    (store, remote)
}

/// A store whose stamps come from a [`FixedClock`].
pub fn clocked_store() -> (Store, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::default());
    let store = Store::with_clock(
        Arc::new(InMemoryRemote::new()),
        StoreConfig::default(),
        clock.clone(),
    );
    (store, clock)
}

pub fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
}

pub fn proxy(id: &str) -> JsonValue {
    json!({ "__type": "proxy", "fieldId": id })
}

pub fn tagged_list(items: Vec<JsonValue>) -> JsonValue {
    json!({ "__type": "list", "fields": items })
}

/// A remote holding a parent `"parent"` whose `data` list references
/// `count` children `"child-0"..`, each with a `title`.
pub fn remote_with_children(count: usize) -> (Arc<InMemoryRemote>, Vec<DocId>) {
    let ids: Vec<DocId> = (0..count).map(|i| DocId::new(format!("child-{i}"))).collect();
    let parent = DocSnapshot::new("parent").with_field(
        "data",
        tagged_list(ids.iter().map(|id| proxy(id.as_str())).collect()),
    );
    let children = ids.iter().enumerate().map(|(i, id)| {
        DocSnapshot::new(id.clone()).with_field("title", json!(format!("Child {i}")))
    });
    let remote = InMemoryRemote::with_docs(std::iter::once(parent).chain(children));
    (Arc::new(remote), ids)
}

/// Ids of a fetch batch, sorted for comparison.
pub fn sorted(mut ids: Vec<DocId>) -> Vec<DocId> {
    ids.sort();
    ids
}
