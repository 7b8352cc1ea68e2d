use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
}

impl HealthResponse {
    /// The store answers and the presence subscription is live.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// The store is unreachable or the presence mirror is stale.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
