use axum::{Json, Router, extract::State, routing::get};

use crate::{config::AlarmPlaybackConfig, state::SharedState};

#[utoipa::path(
    get,
    path = "/alarm/config",
    tag = "alarm",
    responses((status = 200, description = "Alarm playback configuration", body = AlarmPlaybackConfig))
)]
/// Serve the alarm playback configuration loaded at startup.
pub async fn alarm_config(State(state): State<SharedState>) -> Json<AlarmPlaybackConfig> {
    Json(state.alarm().clone())
}

/// Configure the alarm routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/alarm/config", get(alarm_config))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{dao::document_store::memory::MemoryDocumentStore, routes, state::AppState};

    #[tokio::test]
    async fn config_is_served_in_camel_case() {
        let state = AppState::new(
            Arc::new(MemoryDocumentStore::new()),
            AlarmPlaybackConfig::global(),
        );
        let response = routes::router(state)
            .oneshot(Request::get("/alarm/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["alarmVideos"].as_array().is_some_and(|videos| !videos.is_empty()));
        assert!(body["videoLoopCount"].as_u64().is_some_and(|count| count > 0));
        assert!(body["vibrationPattern"].as_array().is_some_and(|pattern| !pattern.is_empty()));
    }
}
