use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/bock",
    tag = "sse",
    responses((status = 200, description = "Active member list, then one event per change", content_type = "text/event-stream", body = String))
)]
/// Stream the active member list to connected frontends.
pub async fn bock_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    info!("New bock SSE connection");
    sse_service::bock_stream(state.bock().active_member_ids())
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/bock", get(bock_stream))
}
