//! "Ich hab Bock" presence: which members currently have the urge to play.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        document_store::DocumentStore,
        models::{BOCK_COLLECTION, CollectionSnapshot, DocumentPath, PresenceRecord, WriteMode},
    },
    error::ServiceError,
    state::{auth::AuthHandle, mirror::Mirror},
};

/// Mirror of the active members of the `bock` collection, plus the writes that flip them.
pub struct BockPresence {
    store: Arc<dyn DocumentStore>,
    auth: AuthHandle,
    active: Mirror<Vec<String>>,
    /// Serializes `subscribe` and `unsubscribe` across the open-then-bind window.
    subscription_gate: Mutex<()>,
}

impl BockPresence {
    /// Create an unsubscribed presence mirror; call [`BockPresence::subscribe`] to start it.
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthHandle) -> Self {
        Self {
            store,
            auth,
            active: Mirror::new(Vec::new()),
            subscription_gate: Mutex::new(()),
        }
    }

    /// Receiver notified whenever the list of active member ids changes.
    pub fn active_member_ids(&self) -> watch::Receiver<Vec<String>> {
        self.active.subscribe()
    }

    /// Current list of active member ids.
    pub fn current_active(&self) -> Vec<String> {
        self.active.current()
    }

    /// Whether a live subscription currently feeds the list.
    pub async fn is_subscribed(&self) -> bool {
        self.active.is_bound().await
    }

    /// (Re)open the live subscription on the whole collection.
    ///
    /// Any previous subscription is torn down before the new one is opened. Every
    /// snapshot replaces the list wholesale.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        let _gate = self.subscription_gate.lock().await;
        self.active.release(None).await;
        let snapshots = self.store.watch_collection(BOCK_COLLECTION).await?;
        self.active
            .bind(snapshots, BOCK_COLLECTION, |snapshot| active_ids(&snapshot))
            .await;
        info!(collection = BOCK_COLLECTION, "subscribed to bock presence");
        Ok(())
    }

    /// Cancel the live subscription, keeping the last list.
    ///
    /// Waits for a `subscribe` still opening its stream, then cancels what it opened.
    pub async fn unsubscribe(&self) {
        let _gate = self.subscription_gate.lock().await;
        self.active.release(None).await;
    }

    /// Set the signed-in member's own active flag.
    pub async fn set_bock_active(&self, active: bool) -> Result<(), ServiceError> {
        let member = self.auth.user().ok_or(ServiceError::NotAuthenticated)?;
        self.write_presence(&member.uid, active).await
    }

    /// Set any member's active flag. Only admins may target someone else.
    pub async fn toggle_user_bock(&self, member_id: &str, active: bool) -> Result<(), ServiceError> {
        let member = self.auth.user().ok_or(ServiceError::NotAuthenticated)?;
        if member.uid != member_id && !self.auth.is_admin() {
            warn!(caller = %member.uid, target = %member_id, "refused bock change for another member");
            return Err(ServiceError::NotAllowed {
                member_id: member_id.to_owned(),
            });
        }
        self.write_presence(member_id, active).await
    }

    /// Full-replace upsert; `active: false` is written, never deleted.
    async fn write_presence(&self, member_id: &str, active: bool) -> Result<(), ServiceError> {
        let path = DocumentPath::new(BOCK_COLLECTION, member_id);
        let fields = PresenceRecord::stamped(active).into_fields(&path)?;
        self.store
            .set_document(&path, fields, WriteMode::Replace)
            .await?;
        debug!(%path, active, "bock presence written");
        Ok(())
    }
}

/// Ids of every record whose `active` field is strictly `true`, in snapshot order.
pub fn active_ids(snapshot: &CollectionSnapshot) -> Vec<String> {
    snapshot
        .iter()
        .filter(|(_, document)| PresenceRecord::is_active(document))
        .map(|(id, _)| id.to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use serde_json::{Value, json};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};
    use tokio::{sync::Notify, time::timeout};

    use super::*;
    use crate::dao::{
        document_store::{SnapshotStream, memory::MemoryDocumentStore},
        models::{DocumentSnapshot, FieldValue, Fields},
        storage::StorageResult,
    };
    use crate::state::auth::{AuthProvider, Member, MemberProfile};

    /// Memory store whose collection subscriptions hang until `open` is notified.
    #[derive(Clone)]
    struct SlowOpenStore {
        inner: MemoryDocumentStore,
        entered: Arc<Notify>,
        open: Arc<Notify>,
    }

    impl DocumentStore for SlowOpenStore {
        fn watch_collection(
            &self,
            collection: &str,
        ) -> BoxFuture<'static, StorageResult<SnapshotStream<CollectionSnapshot>>> {
            let this = self.clone();
            let collection = collection.to_owned();
            Box::pin(async move {
                this.entered.notify_one();
                this.open.notified().await;
                this.inner.watch_collection(&collection).await
            })
        }

        fn watch_document(
            &self,
            path: &DocumentPath,
        ) -> BoxFuture<'static, StorageResult<SnapshotStream<DocumentSnapshot>>> {
            self.inner.watch_document(path)
        }

        fn set_document(
            &self,
            path: &DocumentPath,
            fields: Fields,
            mode: WriteMode,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.set_document(path, fields, mode)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    fn presence(store: &MemoryDocumentStore, provider: &AuthProvider) -> BockPresence {
        BockPresence::new(Arc::new(store.clone()), provider.handle())
    }

    async fn seed(store: &MemoryDocumentStore, id: &str, body: Value) {
        let Value::Object(map) = body else {
            panic!("seed body must be an object")
        };
        let fields: Fields = map
            .into_iter()
            .map(|(name, value)| (name, FieldValue::Value(value)))
            .collect();
        store
            .set_document(&DocumentPath::new(BOCK_COLLECTION, id), fields, WriteMode::Replace)
            .await
            .unwrap();
    }

    async fn wait_for_active(presence: &BockPresence, expected: &[&str]) {
        let mut rx = presence.active_member_ids();
        timeout(Duration::from_secs(1), rx.wait_for(|ids| ids == expected))
            .await
            .unwrap_or_else(|_| panic!("active list never became {expected:?}"))
            .expect("presence alive");
    }

    #[tokio::test]
    async fn only_strictly_true_records_are_active() {
        let store = MemoryDocumentStore::new();
        seed(&store, "alice", json!({ "active": true })).await;
        seed(&store, "bob", json!({ "active": false })).await;
        seed(&store, "carol", json!({ "active": "true" })).await;
        seed(&store, "dave", json!({ "active": 1 })).await;
        seed(&store, "erin", json!({ "updatedAt": "x" })).await;
        seed(&store, "frank", json!({ "active": true, "updatedAt": "x" })).await;

        let provider = AuthProvider::new();
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();

        wait_for_active(&presence, &["alice", "frank"]).await;
    }

    #[tokio::test]
    async fn set_bock_active_requires_sign_in() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        let presence = presence(&store, &provider);

        let err = presence.set_bock_active(true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthenticated));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn set_bock_active_replaces_own_record() {
        let store = MemoryDocumentStore::new();
        seed(&store, "alice", json!({ "active": false, "note": "stale" })).await;
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);

        presence.set_bock_active(true).await.unwrap();

        let stored = store
            .get(&DocumentPath::new(BOCK_COLLECTION, "alice"))
            .unwrap();
        assert_eq!(stored.get("active"), Some(&json!(true)));
        assert_eq!(stored.get("note"), None);
        let updated_at = stored.get("updatedAt").and_then(Value::as_str).unwrap();
        assert!(OffsetDateTime::parse(updated_at, &Rfc3339).is_ok());
    }

    #[tokio::test]
    async fn deactivating_upserts_instead_of_deleting() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();

        presence.set_bock_active(true).await.unwrap();
        wait_for_active(&presence, &["alice"]).await;
        presence.set_bock_active(false).await.unwrap();
        wait_for_active(&presence, &[]).await;

        let stored = store
            .get(&DocumentPath::new(BOCK_COLLECTION, "alice"))
            .unwrap();
        assert_eq!(stored.get("active"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn non_admin_cannot_toggle_others_and_nothing_is_written() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);

        let err = presence.toggle_user_bock("bob", true).await.unwrap_err();
        match err {
            ServiceError::NotAllowed { member_id } => assert_eq!(member_id, "bob"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn toggle_requires_sign_in_before_authorization() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        let presence = presence(&store, &provider);

        let err = presence.toggle_user_bock("bob", true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthenticated));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn member_may_toggle_self() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();

        presence.toggle_user_bock("alice", true).await.unwrap();
        wait_for_active(&presence, &["alice"]).await;
    }

    #[tokio::test]
    async fn admin_toggle_shows_up_on_next_notification() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("root"), MemberProfile::admin());
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();
        wait_for_active(&presence, &[]).await;

        presence.toggle_user_bock("bob", true).await.unwrap();
        wait_for_active(&presence, &["bob"]).await;
    }

    #[tokio::test]
    async fn resubscribing_keeps_a_single_live_subscription() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);

        presence.subscribe().await.unwrap();
        presence.subscribe().await.unwrap();
        presence.subscribe().await.unwrap();
        assert!(presence.is_subscribed().await);

        presence.set_bock_active(true).await.unwrap();
        wait_for_active(&presence, &["alice"]).await;
    }

    #[tokio::test]
    async fn unsubscribed_list_stops_following_the_store() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();

        presence.set_bock_active(true).await.unwrap();
        wait_for_active(&presence, &["alice"]).await;

        presence.unsubscribe().await;
        presence.set_bock_active(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(presence.current_active(), ["alice"]);
        assert!(!presence.is_subscribed().await);
    }

    #[tokio::test]
    async fn unsubscribe_during_open_wins_over_the_pending_subscribe() {
        let store = SlowOpenStore {
            inner: MemoryDocumentStore::new(),
            entered: Arc::new(Notify::new()),
            open: Arc::new(Notify::new()),
        };
        let provider = AuthProvider::new();
        let presence = Arc::new(BockPresence::new(
            Arc::new(store.clone()),
            provider.handle(),
        ));

        let subscribing = tokio::spawn({
            let presence = Arc::clone(&presence);
            async move { presence.subscribe().await }
        });
        store.entered.notified().await;

        let unsubscribing = tokio::spawn({
            let presence = Arc::clone(&presence);
            async move { presence.unsubscribe().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.open.notify_one();

        subscribing.await.unwrap().unwrap();
        unsubscribing.await.unwrap();
        assert!(!presence.is_subscribed().await);
    }

    #[tokio::test]
    async fn dropping_presence_closes_the_list_and_stops_updates() {
        let store = MemoryDocumentStore::new();
        let provider = AuthProvider::new();
        provider.sign_in(Member::new("alice"), MemberProfile::default());
        let presence = presence(&store, &provider);
        presence.subscribe().await.unwrap();
        presence.set_bock_active(true).await.unwrap();
        wait_for_active(&presence, &["alice"]).await;

        let mut rx = presence.active_member_ids();
        drop(presence);

        seed(&store, "bob", json!({ "active": true })).await;
        let changed = timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("sender closed in time");
        assert!(changed.is_err());
        assert_eq!(*rx.borrow(), ["alice"]);
    }
}
