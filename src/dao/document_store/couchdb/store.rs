use std::{sync::Arc, time::Duration};

use async_stream::try_stream;
use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::dao::{
    document_store::{DocumentStore, SnapshotStream},
    models::{
        CollectionSnapshot, Document, DocumentPath, DocumentSnapshot, Fields, WriteMode,
        apply_write, now_rfc3339,
    },
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, END_SUFFIX, StoredDocument, collection_prefix, doc_id,
        seq_param,
    },
};

const ALL_DOCS: &str = "_all_docs";
const CHANGES: &str = "_changes";

/// Document store backed by a single CouchDB database.
///
/// Subscriptions long-poll `_changes` and re-read the watched documents whenever a
/// relevant id shows up in the feed.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    poll_timeout: Duration,
}

impl CouchDocumentStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            poll_timeout: config.poll_timeout,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    /// URL of `segment` inside the database, percent-encoding member-supplied ids.
    fn url(&self, segment: &str) -> CouchResult<Url> {
        let invalid = || CouchDaoError::InvalidUrl {
            url: self.base_url.to_string(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(&self.database)
            .push(segment);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn database_request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.database);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .database_request(Method::PUT)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    debug!(%database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_json<T>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<Option<StoredDocument>> {
        let request = self.request(Method::GET, self.url(doc_id)?);
        let raw = self.get_json::<Document>(doc_id, request).await?;
        Ok(raw.map(StoredDocument::from_raw))
    }

    async fn put_document(&self, doc_id: &str, document: StoredDocument) -> CouchResult<()> {
        let response = self
            .request(Method::PUT, self.url(doc_id)?)
            .json(&document.into_raw(doc_id))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_collection(&self, collection: &str) -> CouchResult<CollectionSnapshot> {
        let prefix = collection_prefix(collection);
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];
        let request = self.request(Method::GET, self.url(ALL_DOCS)?).query(&query);
        let payload = self
            .get_json::<AllDocsResponse>(ALL_DOCS, request)
            .await?
            .ok_or_else(|| CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: StatusCode::NOT_FOUND,
            })?;

        let documents = payload
            .rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.strip_prefix(&prefix)?.to_owned();
                let body = StoredDocument::from_raw(row.doc?).body;
                Some((id, body))
            })
            .collect();
        Ok(CollectionSnapshot::new(documents))
    }

    async fn document_snapshot(&self, path: &DocumentPath) -> CouchResult<DocumentSnapshot> {
        let stored = self.get_document(&doc_id(path)).await?;
        Ok(DocumentSnapshot {
            id: path.id.clone(),
            data: stored.map(|stored| stored.body),
        })
    }

    /// Sequence marking "now" in the changes feed.
    async fn current_seq(&self) -> CouchResult<String> {
        let query = [("since", "now".to_string())];
        let changes = self.changes(query.as_slice()).await?;
        Ok(seq_param(&changes.last_seq))
    }

    /// Block until CouchDB reports changes after `since` or the poll window elapses.
    async fn wait_changes(&self, since: &str) -> CouchResult<ChangesResponse> {
        let query = [
            ("feed", "longpoll".to_string()),
            ("since", since.to_string()),
            ("timeout", self.poll_timeout.as_millis().to_string()),
        ];
        self.changes(query.as_slice()).await
    }

    async fn changes(&self, query: &[(&str, String)]) -> CouchResult<ChangesResponse> {
        let request = self.request(Method::GET, self.url(CHANGES)?).query(query);
        self.get_json::<ChangesResponse>(CHANGES, request)
            .await?
            .ok_or_else(|| CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }
}

impl DocumentStore for CouchDocumentStore {
    fn watch_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'static, StorageResult<SnapshotStream<CollectionSnapshot>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            // Take the sequence first so writes racing the initial listing are replayed.
            let mut since = store.current_seq().await?;
            let initial = store.list_collection(&collection).await?;
            let prefix = collection_prefix(&collection);
            let snapshots: SnapshotStream<_> = Box::pin(try_stream! {
                yield initial;
                loop {
                    let changes = store.wait_changes(&since).await.map_err(StorageError::from)?;
                    since = seq_param(&changes.last_seq);
                    if changes.results.iter().any(|row| row.id.starts_with(&prefix)) {
                        yield store.list_collection(&collection).await.map_err(StorageError::from)?;
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
            let mut since = store.current_seq().await?;
            let initial = store.document_snapshot(&path).await?;
            let watched = doc_id(&path);
            let snapshots: SnapshotStream<_> = Box::pin(try_stream! {
                yield initial;
                loop {
                    let changes = store.wait_changes(&since).await.map_err(StorageError::from)?;
                    since = seq_param(&changes.last_seq);
                    if changes.results.iter().any(|row| row.id == watched) {
                        yield store.document_snapshot(&path).await.map_err(StorageError::from)?;
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
            let doc_id = doc_id(&path);
            let existing = store.get_document(&doc_id).await?.unwrap_or_default();
            // CouchDB has no server-side timestamp sentinel; the adapter stamps at commit.
            let body = apply_write(Some(existing.body), fields, mode, &now_rfc3339());
            let document = StoredDocument {
                rev: existing.rev,
                body,
            };
            store.put_document(&doc_id, document).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("{}/{}", store.base_url, store.database);
            let response = store
                .database_request(Method::GET)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: path.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
