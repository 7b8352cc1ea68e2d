use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the document store and report whether the backend is fully operational.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.store().health_check().await {
        warn!(error = %err, "document store health check failed");
        return HealthResponse::degraded();
    }

    if !state.bock().is_subscribed().await {
        warn!("bock presence subscription is not live");
        return HealthResponse::degraded();
    }

    HealthResponse::ok()
}
