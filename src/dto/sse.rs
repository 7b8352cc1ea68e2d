use axum::response::sse::Event;
use serde::Serialize;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE streams.
pub struct ServerEvent {
    /// SSE `event:` name; unnamed events reach `onmessage`.
    pub event: Option<String>,
    /// Serialized payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

impl From<ServerEvent> for Event {
    fn from(payload: ServerEvent) -> Self {
        let event = Event::default().data(payload.data);
        match payload.event {
            Some(name) => event.event(name),
            None => event,
        }
    }
}
