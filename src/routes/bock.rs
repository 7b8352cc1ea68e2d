use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tracing::info;

use crate::{dto::bock::ActiveMembersResponse, error::AppError, state::SharedState};

#[utoipa::path(
    get,
    path = "/bock",
    tag = "bock",
    responses(
        (status = 200, description = "Members who currently have bock", body = ActiveMembersResponse),
        (status = 503, description = "Presence subscription is not live")
    )
)]
/// Return the mirrored list of active members.
pub async fn active_members(
    State(state): State<SharedState>,
) -> Result<Json<ActiveMembersResponse>, AppError> {
    if !state.bock().is_subscribed().await {
        return Err(AppError::ServiceUnavailable(
            "bock presence subscription is not live".into(),
        ));
    }
    Ok(Json(ActiveMembersResponse {
        active_user_ids: state.bock().current_active(),
    }))
}

#[utoipa::path(
    post,
    path = "/bock/subscribe",
    tag = "bock",
    responses(
        (status = 204, description = "Subscription reopened"),
        (status = 503, description = "Document store unavailable")
    )
)]
/// Reopen the presence subscription after a store failure left the list stale.
pub async fn resubscribe(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    state.bock().subscribe().await?;
    info!("bock presence resubscribed on request");
    Ok(StatusCode::NO_CONTENT)
}

/// Configure the bock routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/bock", get(active_members))
        .route("/bock/subscribe", post(resubscribe))
}
