/// Bock presence mirror and writes.
pub mod bock;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Ready-to-play mirror and setter.
pub mod ready_to_play;
/// Server-Sent Events streaming of mirrored state.
pub mod sse_service;
