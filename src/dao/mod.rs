/// Document store abstraction and its backends.
pub mod document_store;
/// Records exchanged with the document store.
pub mod models;
/// Backend-agnostic storage errors.
pub mod storage;
