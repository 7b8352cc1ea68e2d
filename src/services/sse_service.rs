use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::dto::{bock::ActiveMembersResponse, sse::ServerEvent};

/// Name of the SSE event carrying the active member list.
pub const BOCK_EVENT: &str = "bock";

/// Turn the active member list into an SSE response: the current list first, then one
/// event per change.
pub fn bock_stream(
    receiver: watch::Receiver<Vec<String>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(receiver).filter_map(|active_user_ids| async move {
        let payload = ActiveMembersResponse { active_user_ids };
        match ServerEvent::json(Some(BOCK_EVENT.to_string()), &payload) {
            Ok(event) => Some(Ok::<Event, Infallible>(Event::from(event))),
            Err(err) => {
                warn!(error = %err, "failed to encode bock event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
