//! Guest-assistant HTTP gateway.
//!
//! Exposes one streaming endpoint: `POST /chat` takes a guest turn and
//! answers with newline-delimited protocol frames over a chunked body.

pub mod chat;
pub mod server;

pub use server::{AppState, build_app, start};
