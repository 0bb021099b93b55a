//! Remote resolution: batched fetch-by-id.
//!
//! The [`Store`](super::Store) never talks to a transport directly. It hands
//! a batch of ids to a [`RemoteResolver`] and materializes whatever snapshots
//! come back. [`InMemoryRemote`] is a map-backed resolver that can be loaded
//! from and saved to a JSON file.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Mutex, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::errors::StoreError;
use crate::{Result, doc::DocSnapshot, id::DocId};

/// Source of documents not yet held by a store.
#[async_trait]
pub trait RemoteResolver: Send + Sync {
    /// Fetches the snapshots for `ids` in one request.
    ///
    /// Ids the remote does not know are omitted from the result; that is not
    /// an error. An `Err` fails the whole batch.
    async fn fetch(&self, ids: &[DocId]) -> Result<Vec<DocSnapshot>>;
}

/// The current remote file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const FILE_VERSION: u8 = 0;

fn is_v0(v: &u8) -> bool {
    *v == 0
}

fn validate_file_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != FILE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported file version {version}; only version {FILE_VERSION} is supported"
        )));
    }
    Ok(version)
}

#[derive(Serialize, Deserialize)]
struct RemoteFile {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_file_version"
    )]
    version: u8,
    #[serde(default)]
    docs: Vec<DocSnapshot>,
}

/// Map-backed resolver.
///
/// Every fetch is recorded, so tests can assert how many requests were issued
/// and which ids each one carried.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    docs: RwLock<BTreeMap<DocId, DocSnapshot>>,
    fetch_log: Mutex<Vec<Vec<DocId>>>,
    failure: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a remote holding `snapshots`.
    pub fn with_docs(snapshots: impl IntoIterator<Item = DocSnapshot>) -> Self {
        let remote = Self::new();
        for snapshot in snapshots {
            remote.put(snapshot);
        }
        remote
    }

    /// Inserts or replaces a snapshot.
    pub fn put(&self, snapshot: DocSnapshot) {
        self.docs
            .write()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    pub fn get(&self, id: &DocId) -> Option<DocSnapshot> {
        self.docs.read().unwrap().get(id).cloned()
    }

    /// Ids of every held snapshot, in order.
    pub fn ids(&self) -> Vec<DocId> {
        self.docs.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().unwrap().is_empty()
    }

    /// Id batches of every fetch so far, in order.
    pub fn fetch_log(&self) -> Vec<Vec<DocId>> {
        self.fetch_log.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_log.lock().unwrap().len()
    }

    /// Makes every subsequent fetch fail with `reason`, or succeed again with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap() = reason.map(str::to_string);
    }

    /// Delays every subsequent fetch.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Loads a remote from a JSON file. A missing file yields an empty remote.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let file: RemoteFile =
                    serde_json::from_str(&json).map_err(|e| StoreError::InvalidFile {
                        reason: e.to_string(),
                    })?;
                Ok(Self::with_docs(file.docs))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes every held snapshot to `path` as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = RemoteFile {
            version: FILE_VERSION,
            docs: self.docs.read().unwrap().values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteResolver for InMemoryRemote {
    async fn fetch(&self, ids: &[DocId]) -> Result<Vec<DocSnapshot>> {
        self.fetch_log.lock().unwrap().push(ids.to_vec());
        debug!(count = ids.len(), "remote fetch");

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let failure = self.failure.lock().unwrap().clone();
        if let Some(reason) = failure {
            return Err(StoreError::ResolutionFailed {
                ids: ids.to_vec(),
                reason,
            }
            .into());
        }

        let docs = self.docs.read().unwrap();
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }
}
