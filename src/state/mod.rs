pub mod auth;
pub mod mirror;

use std::sync::Arc;

use crate::{
    config::AlarmPlaybackConfig, dao::document_store::DocumentStore,
    services::bock::BockPresence, state::auth::AuthHandle,
};

pub type SharedState = Arc<AppState>;

/// State shared by the HTTP handlers.
///
/// The served presence mirror is read-only: it is bound to a signed-out auth handle
/// because member authentication happens outside this process.
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    bock: BockPresence,
    alarm: &'static AlarmPlaybackConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<dyn DocumentStore>, alarm: &'static AlarmPlaybackConfig) -> SharedState {
        let bock = BockPresence::new(Arc::clone(&store), AuthHandle::signed_out());
        Arc::new(Self { store, bock, alarm })
    }

    /// Document store backing every component.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Presence mirror served over HTTP.
    pub fn bock(&self) -> &BockPresence {
        &self.bock
    }

    /// Alarm configuration served to clients.
    pub fn alarm(&self) -> &'static AlarmPlaybackConfig {
        self.alarm
    }
}
