#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::dao::models::{CollectionSnapshot, DocumentPath, DocumentSnapshot, Fields, WriteMode};
use crate::dao::storage::StorageResult;

/// Stream of snapshots produced by a live subscription. The first item is the current state.
pub type SnapshotStream<T> = BoxStream<'static, StorageResult<T>>;

/// Abstraction over the real-time document store backing presence and readiness.
pub trait DocumentStore: Send + Sync {
    /// Open a live subscription delivering a full snapshot of `collection` on every change.
    fn watch_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'static, StorageResult<SnapshotStream<CollectionSnapshot>>>;
    /// Open a live subscription on a single document.
    fn watch_document(
        &self,
        path: &DocumentPath,
    ) -> BoxFuture<'static, StorageResult<SnapshotStream<DocumentSnapshot>>>;
    /// Upsert a document, replacing or merging according to `mode`.
    fn set_document(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round-trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
