//! Ready-to-play flag of the signed-in member, mirrored from its member document.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};

use crate::{
    dao::{
        document_store::DocumentStore,
        models::{
            DocumentPath, FieldValue, Fields, READY_TO_PLAY_FIELD, USERS_COLLECTION, WriteMode,
            ready_to_play_at,
        },
    },
    error::ServiceError,
    state::{
        auth::{AuthHandle, Member},
        mirror::Mirror,
    },
};

type ReadyAt = Option<OffsetDateTime>;

/// Mirror of `users/{uid}.readyToPlayAt` that follows whoever is signed in.
///
/// Dropping the signal stops following the auth state and cancels the subscription.
pub struct ReadyToPlaySignal {
    store: Arc<dyn DocumentStore>,
    auth: AuthHandle,
    ready_at: Arc<Mirror<ReadyAt>>,
    driver: JoinHandle<()>,
}

impl ReadyToPlaySignal {
    /// Start following the signed-in member. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn DocumentStore>, auth: AuthHandle) -> Self {
        let ready_at = Arc::new(Mirror::new(None));
        let driver = tokio::spawn(follow_member(
            Arc::clone(&store),
            auth.watch_user(),
            Arc::clone(&ready_at),
        ));
        Self {
            store,
            auth,
            ready_at,
            driver,
        }
    }

    /// Receiver notified whenever the mirrored timestamp changes.
    pub fn ready_to_play_at(&self) -> watch::Receiver<ReadyAt> {
        self.ready_at.subscribe()
    }

    /// Since when the signed-in member is ready, `None` when not ready or signed out.
    pub fn current(&self) -> ReadyAt {
        self.ready_at.current()
    }

    /// Set or clear the ready flag with a store-assigned timestamp.
    ///
    /// Signed-out callers get `Ok(())` without any write. The write is a merge, so the
    /// rest of the member document is left alone.
    pub async fn set_ready_to_play(&self, is_ready: bool) -> Result<(), ServiceError> {
        let Some(member) = self.auth.user() else {
            debug!("ignoring ready-to-play change while signed out");
            return Ok(());
        };
        let path = DocumentPath::new(USERS_COLLECTION, member.uid);
        let value = if is_ready {
            FieldValue::ServerTimestamp
        } else {
            FieldValue::Value(Value::Null)
        };
        let mut fields = Fields::new();
        fields.insert(READY_TO_PLAY_FIELD.to_owned(), value);
        self.store
            .set_document(&path, fields, WriteMode::Merge)
            .await?;
        debug!(%path, is_ready, "ready-to-play written");
        Ok(())
    }
}

impl Drop for ReadyToPlaySignal {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Rebind the mirror every time the signed-in uid changes.
async fn follow_member(
    store: Arc<dyn DocumentStore>,
    mut user: watch::Receiver<Option<Member>>,
    ready_at: Arc<Mirror<ReadyAt>>,
) {
    let mut observed: Option<String> = None;
    loop {
        let uid = user.borrow_and_update().as_ref().map(|member| member.uid.clone());
        if uid != observed {
            // The previous member's value must not linger while the next one loads.
            ready_at.release(Some(None)).await;
            if let Some(uid) = &uid {
                let path = DocumentPath::new(USERS_COLLECTION, uid.as_str());
                match store.watch_document(&path).await {
                    Ok(snapshots) => {
                        ready_at
                            .bind(snapshots, "ready_to_play", |snapshot| {
                                ready_to_play_at(&snapshot)
                            })
                            .await;
                        info!(member = %uid, "following ready-to-play state");
                    }
                    Err(err) => {
                        error!(member = %uid, error = %err, "failed to subscribe to ready-to-play state");
                    }
                }
            }
            observed = uid;
        }

        if user.changed().await.is_err() {
            debug!("auth provider gone; ready-to-play identity frozen");
            return;
        }
    }
}
