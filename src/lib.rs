//! Library crate for bock-back: live mirrors of "who has bock" and "who is ready to play"
//! over a real-time document store, plus the pause alarm configuration.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AlarmPlaybackConfig;
pub use error::ServiceError;
pub use services::{bock::BockPresence, ready_to_play::ReadyToPlaySignal};
pub use state::auth::{AuthHandle, AuthProvider, Member, MemberProfile};
