//! In-process document store used by tests and as the fallback backend of the binary.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_stream::stream;
use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::{DocumentStore, SnapshotStream};
use crate::dao::{
    models::{
        CollectionSnapshot, Document, DocumentPath, DocumentSnapshot, Fields, WriteMode,
        apply_write, now_rfc3339,
    },
    storage::StorageResult,
};

/// Capacity of the change notification channel shared by every watcher.
const CHANGE_CAPACITY: usize = 64;

/// Document store keeping every collection in memory and fanning out changes to watchers.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: DashMap<String, IndexMap<String, Document>>,
    changes: broadcast::Sender<DocumentPath>,
    writes: AtomicU64,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: DashMap::new(),
                changes,
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Number of writes committed since the store was created.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Read the current body of a document.
    pub fn get(&self, path: &DocumentPath) -> Option<Document> {
        self.inner
            .collections
            .get(&path.collection)
            .and_then(|collection| collection.get(&path.id).cloned())
    }

    fn collection_snapshot(&self, collection: &str) -> CollectionSnapshot {
        let documents = self
            .inner
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, body)| (id.clone(), body.clone()))
                    .collect()
            })
            .unwrap_or_default();
        CollectionSnapshot::new(documents)
    }

    fn document_snapshot(&self, path: &DocumentPath) -> DocumentSnapshot {
        DocumentSnapshot {
            id: path.id.clone(),
            data: self.get(path),
        }
    }

    fn commit(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) {
        let commit_time = now_rfc3339();
        {
            let mut collection = self
                .inner
                .collections
                .entry(path.collection.clone())
                .or_default();
            match collection.get_mut(&path.id) {
                Some(slot) => {
                    let existing = std::mem::take(slot);
                    *slot = apply_write(Some(existing), fields, mode, &commit_time);
                }
                None => {
                    let written = apply_write(None, fields, mode, &commit_time);
                    collection.insert(path.id.clone(), written);
                }
            }
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        // Nobody listening is fine.
        let _ = self.inner.changes.send(path.clone());
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn watch_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'static, StorageResult<SnapshotStream<CollectionSnapshot>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            // Subscribe before reading so no commit falls between the two.
            let mut changes = store.inner.changes.subscribe();
            let initial = store.collection_snapshot(&collection);
            let snapshots: SnapshotStream<_> = Box::pin(stream! {
                yield Ok(initial);
                loop {
                    match changes.recv().await {
                        Ok(path) if path.collection == collection => {
                            yield Ok(store.collection_snapshot(&collection));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%collection, skipped, "collection watcher lagged; resending snapshot");
                            yield Ok(store.collection_snapshot(&collection));
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            Ok(snapshots)
        })
    }

    fn watch_document(
        &self,
        path: &DocumentPath,
    ) -> BoxFuture<'static, StorageResult<SnapshotStream<DocumentSnapshot>>> {
        let store = self.clone();
        let path = path.clone();
        Box::pin(async move {
            let mut changes = store.inner.changes.subscribe();
            let initial = store.document_snapshot(&path);
            let snapshots: SnapshotStream<_> = Box::pin(stream! {
                yield Ok(initial);
                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == path => {
                            yield Ok(store.document_snapshot(&path));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%path, skipped, "document watcher lagged; resending snapshot");
                            yield Ok(store.document_snapshot(&path));
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            Ok(snapshots)
        })
    }

    fn set_document(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.clone();
        Box::pin(async move {
            store.commit(&path, fields, mode);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::dao::models::FieldValue;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), FieldValue::Value(value.clone())))
            .collect()
    }

    #[tokio::test]
    async fn collection_watch_starts_with_current_state() {
        let store = MemoryDocumentStore::new();
        store
            .set_document(
                &DocumentPath::new("bock", "alice"),
                fields(&[("active", json!(true))]),
                WriteMode::Replace,
            )
            .await
            .unwrap();

        let mut snapshots = store.watch_collection("bock").await.unwrap();
        let first = snapshots.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.iter().next().map(|(id, _)| id), Some("alice"));
    }

    #[tokio::test]
    async fn collection_watch_ignores_other_collections() {
        let store = MemoryDocumentStore::new();
        let mut snapshots = store.watch_collection("bock").await.unwrap();
        assert!(snapshots.next().await.unwrap().unwrap().is_empty());

        store
            .set_document(
                &DocumentPath::new("users", "alice"),
                fields(&[("name", json!("Alice"))]),
                WriteMode::Merge,
            )
            .await
            .unwrap();
        store
            .set_document(
                &DocumentPath::new("bock", "bob"),
                fields(&[("active", json!(true))]),
                WriteMode::Replace,
            )
            .await
            .unwrap();

        let next = timeout(Duration::from_secs(1), snapshots.next())
            .await
            .expect("snapshot delivered")
            .unwrap()
            .unwrap();
        assert_eq!(next.iter().map(|(id, _)| id).collect::<Vec<_>>(), ["bob"]);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn document_watch_reports_missing_then_written() {
        let store = MemoryDocumentStore::new();
        let path = DocumentPath::new("users", "alice");
        let mut snapshots = store.watch_document(&path).await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap().data, None);

        store
            .set_document(
                &path,
                fields(&[("name", json!("Alice"))]),
                WriteMode::Merge,
            )
            .await
            .unwrap();

        let next = timeout(Duration::from_secs(1), snapshots.next())
            .await
            .expect("snapshot delivered")
            .unwrap()
            .unwrap();
        assert_eq!(next.field("name"), Some(&json!("Alice")));
    }

    #[tokio::test]
    async fn server_timestamp_resolves_on_commit() {
        let store = MemoryDocumentStore::new();
        let path = DocumentPath::new("users", "alice");
        let mut write = Fields::new();
        write.insert("readyToPlayAt".into(), FieldValue::ServerTimestamp);
        store.set_document(&path, write, WriteMode::Merge).await.unwrap();

        let stored = store.get(&path).unwrap();
        match stored.get("readyToPlayAt") {
            Some(serde_json::Value::String(stamp)) => {
                assert_eq!(stamp.len(), "2026-01-01T00:00:00.000Z".len());
                assert!(stamp.ends_with('Z'));
            }
            other => panic!("unexpected readyToPlayAt: {other:?}"),
        }
    }
}
