/// Active member list payloads.
pub mod bock;
/// Health check payloads.
pub mod health;
/// Server-Sent Events envelope.
pub mod sse;
